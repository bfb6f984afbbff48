pub mod fake_feed;
pub mod feed;
pub mod http_cache;
pub mod http_client;
pub mod ladder;
pub mod magic;
pub mod predictions;
pub mod round_data;
pub mod sgm_math;
pub mod sgm_session;
pub mod sim_table;
pub mod state;
pub mod tabular;
pub mod tracker;
