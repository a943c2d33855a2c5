mod config_scenarios;
