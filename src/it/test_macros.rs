macro_rules! tassert {
    ($cond:expr) => {
        if !$cond {
            bail!(
                "Assert `{}` failed ({}:{})",
                stringify!($cond),
                file!(),
                line!()
            );
        }
    };
}

macro_rules! tassert_eq {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            bail!(
                "Assert `{} = {:?} = {:?} = {}` failed ({}:{})",
                stringify!($left),
                left,
                right,
                stringify!($right),
                file!(),
                line!()
            );
        }
    }};
}

macro_rules! testcase {
    () => {
        pub struct Test;

        impl crate::it::tests::TestCase for Test {
            fn name(&self) -> &'static str {
                let path = module_path!();
                path.strip_prefix("wl_present::it::tests::").unwrap_or(path)
            }

            fn run(
                &self,
                testrun: &crate::it::testrun::TestRun,
            ) -> crate::it::test_error::TestResult {
                test(testrun)
            }
        }

        #[test]
        fn single() {
            crate::it::run_test(&Test)
        }
    };
}
