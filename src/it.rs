use {
    crate::{
        it::{testrun::TestRun, tests::TestCase},
        logger::Logger,
        utils::errorfmt::ErrorFmt,
    },
    isnt::std_1::vec::IsntVecExt,
    log::Level,
};

#[macro_use]
mod test_error;
#[macro_use]
mod test_macros;
mod test_gfx_api;
pub mod test_sync_obj;
mod test_transport;

fn run_test(test: &dyn TestCase) {
    if let Err(e) = Logger::install_stderr(Level::Trace) {
        panic!("Could not install the logger: {}", ErrorFmt(e));
    }
    log::info!("Running {}", test.name());
    let run = TestRun::new();
    let mut errors = vec![];
    if let Err(e) = test.run(&run) {
        errors.push(e.to_string());
    }
    for e in run.compositor.take_errors() {
        errors.push(format!("The compositor reported an error: {}", e));
    }
    if errors.is_not_empty() {
        log::error!("The following errors occurred:");
        for e in &errors {
            log::error!("    {}", e);
        }
        panic!("Test {} failed", test.name());
    }
}
