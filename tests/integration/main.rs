mod anchor_scenarios;
mod app_flows;
mod helpers;
mod loader_flows;
mod persistence;
