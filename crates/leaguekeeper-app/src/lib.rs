// Library root for the sync service: the HTTP calendar transport and the
// periodic runner, exposed for the binary and integration tests.

pub mod calendar_http;
pub mod runner;
