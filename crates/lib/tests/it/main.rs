/*! Integration tests for cas-client.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * Every test runs the client against `authority::AuthorityDouble`, an
 * in-process CAS server on a loopback port:
 * - validate: service ticket validation, with and without proxy capability
 * - correlation: ordering of the PGT callback relative to the validation response
 * - callback: the callback route over HTTP
 * - proxy: proxy ticket acquisition
 * - restlet: credential issuance, revocation and the cached-PGT helper
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("cas_client=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod callback;
mod helpers;
mod restlet;
mod validate;
