// ABOUTME: Constants for the interpreter: banner text and fixed capacities

/// Printed once when the REPL starts.
pub const WELCOME_MESSAGE: &str = "Welcome to sch. Use ctrl-c to exit.";

/// Printed on end-of-input before a clean exit.
pub const GOODBYE_MESSAGE: &str = "Goodbye";

/// The REPL prompt.
pub const PROMPT: &str = "> ";

/// Prompt shown while an expression is still open across lines.
pub const CONTINUATION_PROMPT: &str = "  ";

/// Maximum size of a string or symbol token, counting a terminator
/// slot (payloads top out at `BUFFER_MAX - 1` bytes).
pub const BUFFER_MAX: usize = 1000;

/// Capacity of the GC root stack; exceeding it is a resource error.
pub const ROOT_STACK_CAPACITY: usize = 2048;

/// Live-object count that triggers the first collection. After each
/// collection the threshold is reset to `max(this, 2 * live)`.
pub const INITIAL_GC_THRESHOLD: usize = 1000;
