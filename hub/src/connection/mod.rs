pub mod backoff;
pub mod connection_state;
pub mod reconnect_timer;
