// Copyright (c) 2024 DCHAIN LABS

/// Machine readable trace line: event name followed by JSON parameters.
#[macro_export]
macro_rules! dchain_trace {
    ($evt:expr, $params:tt) => {
        tracing::trace!("dchain_trace:{}:{}", $evt, serde_json::json!($params));
    };
}
