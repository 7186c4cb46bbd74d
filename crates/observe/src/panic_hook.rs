use std::panic::PanicHookInfo;

/// Exit code used when the process is torn down by a panic. Matches the code
/// the default Rust runtime uses for a panicking main thread.
pub const PANIC_EXIT_CODE: i32 = 101;

/// Installs a panic hook that reports the panic through `tracing` and then
/// terminates the process.
///
/// A panic inside a spawned task would otherwise only kill that task, leaving a
/// half-finished deployment running without anybody observing it.
pub fn install() {
    std::panic::set_hook(Box::new(|panic| {
        tracing_panic_hook(panic);
        std::process::exit(PANIC_EXIT_CODE);
    }));
}

/// Prints roughly the same message as the default panic hook but uses
/// tracing:error instead of stderr.
fn tracing_panic_hook(panic: &PanicHookInfo<'_>) {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("<unnamed>");
    let backtrace = std::backtrace::Backtrace::force_capture();
    tracing::error!("thread '{name}' {panic}\nstack backtrace:\n{backtrace}");
}
