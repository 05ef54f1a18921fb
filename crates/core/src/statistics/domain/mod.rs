pub mod statistics_aggregator;
