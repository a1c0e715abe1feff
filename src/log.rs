//! log.rs
//!
//! Localized messages for logging and terminal output.
//! Provides macros: tr!(), linfo!(), lwarn!(), ldebug!(), lprintln!().
//! Each macro takes the localizer explicitly, resolves the dotted key and
//! substitutes `{}` placeholders with the arguments in order.

use std::collections::HashMap;
use tracing::debug;

/// Internal helper: replaces `{}` placeholders with provided arguments
pub fn format_ordered(template: &str, args: &[String]) -> String {
    let mut result = String::new();
    let mut parts = template.split("{}");
    let mut iter = args.iter();

    if let Some(first) = parts.next() {
        result.push_str(first);
    }

    for part in parts {
        if let Some(arg) = iter.next() {
            result.push_str(arg);
        }
        result.push_str(part);
    }

    result
}

/// Replaces `{name}` placeholders. An unknown placeholder leaves the template
/// untouched.
pub fn format_named(template: &str, args: &[(&str, &str)]) -> String {
    let vars: HashMap<String, String> = args
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    strfmt::strfmt(template, &vars).unwrap_or_else(|e| {
        debug!("cannot format '{}': {}", template, e);
        template.to_string()
    })
}

/// Localized string with positional arguments
#[macro_export]
macro_rules! tr {
    ($loc:expr, $key:expr $(, $arg:expr)* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::hub::Localizer as _;
            let template = ($loc).get_string($key);
            let args: Vec<String> = vec![$(format!("{}", $arg)),*];
            $crate::log::format_ordered(&template, &args)
        }
    };
}

/// Localized info macro
#[macro_export]
macro_rules! linfo {
    ($loc:expr, $key:expr $(, $arg:expr)* $(,)?) => {
        {
            let msg = $crate::tr!($loc, $key $(, $arg)*);
            tracing::info!(target: "locman", "{}", msg);
        }
    };
}

/// Localized warn macro
#[macro_export]
macro_rules! lwarn {
    ($loc:expr, $key:expr $(, $arg:expr)* $(,)?) => {
        {
            let msg = $crate::tr!($loc, $key $(, $arg)*);
            tracing::warn!(target: "locman", "{}", msg);
        }
    };
}

/// Localized debug macro
#[macro_export]
macro_rules! ldebug {
    ($loc:expr, $key:expr $(, $arg:expr)* $(,)?) => {
        {
            let msg = $crate::tr!($loc, $key $(, $arg)*);
            tracing::debug!(target: "locman", "{}", msg);
        }
    };
}

/// Localized println macro
#[macro_export]
macro_rules! lprintln {
    ($loc:expr, $key:expr $(, $arg:expr)* $(,)?) => {
        {
            let msg = $crate::tr!($loc, $key $(, $arg)*);
            println!("{}", msg);
        }
    };
}
