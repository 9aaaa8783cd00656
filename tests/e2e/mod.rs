// End-to-end tests for the TTS orchestration layer
//
// Each test starts its own mock synthesis backend (axum on 127.0.0.1:0) and a
// scratch output directory through the test-context lifecycle hooks, so tests
// run in parallel without sharing state. Subprocess transport tests run a
// generated shell script and are serialized.

mod helpers;
mod test_dispatcher;
mod test_subprocess;
mod test_synthesis;
