//! Log macros that forward to `defmt` when the `defmt` feature is on.
//!
//! Brought into scope with `#[macro_use]` and called unqualified. `warn`
//! cannot be re-exported by path: it shares its name with the built-in
//! `#[warn]` attribute.
//!
//! Unit tests run on the host without a defmt global logger, so logging is
//! compiled out there as well. Format strings must stay in the subset that
//! defmt accepts.
#![allow(unused_macros)]

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(all(feature = "defmt", not(test)))]
        ::defmt::trace!($s $(, $x)*);
        #[cfg(not(all(feature = "defmt", not(test))))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(all(feature = "defmt", not(test)))]
        ::defmt::debug!($s $(, $x)*);
        #[cfg(not(all(feature = "defmt", not(test))))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(all(feature = "defmt", not(test)))]
        ::defmt::warn!($s $(, $x)*);
        #[cfg(not(all(feature = "defmt", not(test))))]
        let _ = ($( & $x ),*);
    }};
}
