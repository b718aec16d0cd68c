/// Default per-quantum byte ceiling for the socket channel handler.
///
/// A readable socket never consumes more than this many bytes before the
/// handler yields the event-loop thread with a re-scheduled read task.
pub const DEFAULT_MAX_RW_SIZE: usize = 16 * 1024;

/// Largest value a URI port can hold.
pub const MAX_URI_PORT: u32 = 65535;

/// A URI port is written with at most this many decimal digits.
pub const MAX_URI_PORT_DIGITS: usize = 5;
