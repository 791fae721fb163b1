/// Error code registry for parallel-mapreduce
///
/// Error codes are organized by category:
/// - 1000-1999: Input and partitioning errors
/// - 2000-2999: Worker process errors
/// - 3000-3999: Configuration errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Input errors (1000-1999)
    pub const INPUT_EMPTY: u16 = 1001;
    pub const PARTITION_INVALID_WORKER_COUNT: u16 = 1002;

    // Worker process errors (2000-2999)
    pub const WORKER_SPAWN_FAILED: u16 = 2001;
    pub const WORKER_IO_ERROR: u16 = 2002;
    pub const WORKER_CRASHED: u16 = 2003;
    pub const WORKER_PROTOCOL_ERROR: u16 = 2004;
    pub const WORKER_TASK_FAILED: u16 = 2005;

    // Configuration errors (3000-3999)
    pub const CONFIG_GENERIC: u16 = 3000;
    pub const CONFIG_NOT_FOUND: u16 = 3001;
    pub const CONFIG_PARSE_ERROR: u16 = 3002;
    pub const CONFIG_INVALID_VALUE: u16 = 3003;

    // Other errors (9000-9999)
    pub const SERIALIZATION_ERROR: u16 = 9001;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::INPUT_EMPTY => "Input collection is empty",
        ErrorCode::PARTITION_INVALID_WORKER_COUNT => "Worker count must be between 1 and u32::MAX",

        ErrorCode::WORKER_SPAWN_FAILED => "Worker process could not be started",
        ErrorCode::WORKER_IO_ERROR => "Could not communicate with worker process",
        ErrorCode::WORKER_CRASHED => "Worker process exited before replying",
        ErrorCode::WORKER_PROTOCOL_ERROR => "Worker reply could not be decoded",
        ErrorCode::WORKER_TASK_FAILED => "Worker task reported an error",

        ErrorCode::CONFIG_GENERIC => "Configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file could not be parsed",
        ErrorCode::CONFIG_INVALID_VALUE => "Configuration value is invalid",

        ErrorCode::SERIALIZATION_ERROR => "Value could not be converted to or from JSON",
        _ => "Unknown error",
    }
}
