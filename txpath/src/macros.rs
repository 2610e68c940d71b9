#[cfg(feature = "log")]
macro_rules! net_log {
    (trace, $($arg:expr),*) => { ::log::trace!($($arg),*); };
    (debug, $($arg:expr),*) => { ::log::debug!($($arg),*); };
}

#[cfg(not(feature = "log"))]
macro_rules! net_log {
    ($level:ident, $($arg:expr),*) => { $( let _ = &$arg; )* }
}

macro_rules! net_trace {
    ($($arg:expr),*) => (net_log!(trace, $($arg),*));
}

macro_rules! net_debug {
    ($($arg:expr),*) => (net_log!(debug, $($arg),*));
}
