//! Debug dispatch handlers.

use super::dispatcher::{run_on, DPromise};
use super::Bridge;
use crate::value::Value;

pub fn show_debug_view(bridge: &Bridge) -> DPromise {
    let debug = bridge.sdk().debug.clone();
    run_on(bridge.contexts().main.as_ref(), move || {
        if !debug.show_debug_view() {
            tracing::warn!("Debug view could not be presented");
        }
        Ok(Value::Null)
    })
}

#[cfg(test)]
mod tests {
    use crate::bridge::tests::configured;
    use crate::params::Parameters;
    use crate::value::Value;

    #[test]
    fn test_show_debug_view() {
        let (bridge, memory) = configured();
        let result = bridge.dispatch("debug.showDebugView", Parameters::new()).wait_blocking();
        assert_eq!(result, Ok(Value::Null));
        assert!(memory.was_called("debug.show_debug_view"));
    }
}
