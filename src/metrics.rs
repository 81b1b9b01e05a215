use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("hemingway_requests_total", "Total number of analyze requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("hemingway_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("hemingway_cache_misses_total", "Total cache misses").unwrap();
    pub static ref CACHE_ERRORS: Counter =
        register_counter!("hemingway_cache_errors_total", "Cache reads or writes that failed").unwrap();
    pub static ref MODEL_CALLS: Counter =
        register_counter!("hemingway_model_calls_total", "Calls made to the completion API").unwrap();
    pub static ref MODEL_ERRORS: Counter =
        register_counter!("hemingway_model_errors_total", "Failed completion API calls").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "hemingway_request_latency_seconds",
        "Analyze request latency in seconds"
    )
    .unwrap();
}
