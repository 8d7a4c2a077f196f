// message_viewport — Scroll-stable chat history viewport
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("State file could not be read")]
    StateUnreadable,
    #[error("State file could not be written")]
    StateUnwritable,
    #[error("Terminal setup failed")]
    TerminalSetup,
    #[error("Invalid configuration")]
    InvalidConfig,
}

impl AppError {
    pub const STATE_UNREADABLE_EXIT_CODE: i32 = 20;
    pub const STATE_UNWRITABLE_EXIT_CODE: i32 = 21;
    pub const TERMINAL_SETUP_EXIT_CODE: i32 = 22;
    pub const INVALID_CONFIG_EXIT_CODE: i32 = 23;

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StateUnreadable => Self::STATE_UNREADABLE_EXIT_CODE,
            Self::StateUnwritable => Self::STATE_UNWRITABLE_EXIT_CODE,
            Self::TerminalSetup => Self::TERMINAL_SETUP_EXIT_CODE,
            Self::InvalidConfig => Self::INVALID_CONFIG_EXIT_CODE,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::StateUnreadable => {
                "The state file exists but could not be read. Remove it or pass another --state-file."
            }
            Self::StateUnwritable => "Scroll positions and cached ids could not be saved.",
            Self::TerminalSetup => "The terminal could not be switched to full-screen mode.",
            Self::InvalidConfig => "--window-size must be at least 1.",
        }
    }
}
