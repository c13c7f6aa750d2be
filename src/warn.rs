//! Printing log statements to stderr.

use std::sync::atomic::{AtomicBool, Ordering};

/// Switches `debug!` output on or off for the whole process.
pub static DO_DEBUG: AtomicBool = AtomicBool::new(false);

pub fn set_debug(on: bool) {
    DO_DEBUG.store(on, Ordering::SeqCst);
}

pub fn debug_enabled() -> bool {
    DO_DEBUG.load(Ordering::SeqCst)
}

#[macro_export]
macro_rules! warn {
    ($formatstr:expr $(,$arg:expr)*) => { {
        use std::io::Write;
        let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
        let _ = write!(&mut outp, "W: ");
        let _ = write!(&mut outp, $formatstr $(,$arg)*);
        let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
        let _ = outp.flush();
    } }
}

#[macro_export]
macro_rules! info {
    ($formatstr:expr $(,$arg:expr)*) => { {
        use std::io::Write;
        let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
        let _ = write!(&mut outp, "I: ");
        let _ = write!(&mut outp, $formatstr $(,$arg)*);
        let _ = writeln!(&mut outp);
        let _ = outp.flush();
    } }
}

/// Only prints if `DO_DEBUG` is set, see `set_debug`.
#[macro_export]
macro_rules! debug {
    ($formatstr:expr $(,$arg:expr)*) => { {
        if $crate::warn::debug_enabled() {
            use std::io::Write;
            let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
            let _ = write!(&mut outp, "{:?} D: ", std::thread::current().id());
            let _ = write!(&mut outp, $formatstr $(,$arg)*);
            let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
            let _ = outp.flush();
        }
    } }
}

#[macro_export]
macro_rules! nodebug {
    ($formatstr:expr $(,$arg:expr)*) => {
    }
}
