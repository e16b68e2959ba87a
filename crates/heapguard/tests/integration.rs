#![cfg(any(feature = "leak-tracking", feature = "clobber"))]

#[cfg(test)]
pub mod tests {
    use heapguard::LeakReport;
    use std::process::{Command, Output};

    fn run_example(example: &str, features: &[&str], envs: &[(&str, &str)]) -> Output {
        run_example_with_args(example, features, envs, &[])
    }

    fn run_example_with_args(
        example: &str,
        features: &[&str],
        envs: &[(&str, &str)],
        args: &[&str],
    ) -> Output {
        let mut command = Command::new("cargo");
        command.args(["run", "-p", "test-heapguard", "--example", example]);
        if !features.is_empty() {
            command.args(["--features", &features.join(",")]);
        }
        if !args.is_empty() {
            command.arg("--").args(args);
        }
        command.env_remove("HEAPGUARD_FORMAT").env("NO_COLOR", "1");
        for (key, value) in envs {
            command.env(key, value);
        }
        command.output().expect("Failed to execute command")
    }

    fn assert_success(output: &Output) {
        assert!(
            output.status.success(),
            "Process did not exit successfully.\n\nstderr:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    // cargo run -p test-heapguard --example basic_leaks
    #[test]
    fn test_basic_leaks_table() {
        let output = run_example("basic_leaks", &[], &[]);
        assert_success(&output);

        let stdout = String::from_utf8_lossy(&output.stdout);
        let all_expected = [
            "[heapguard] 2 unfreed blocks (44 B) at 2 call sites",
            "Call site",
            "basic_leaks.rs:5",
            "basic_leaks.rs:7",
        ];
        for expected in all_expected {
            assert!(
                stdout.contains(expected),
                "Expected:\n{expected}\n\nGot:\n{stdout}",
            );
        }

        assert!(
            !stdout.contains("basic_leaks.rs:6"),
            "Released block was reported:\n{stdout}"
        );
        let first = stdout.find("basic_leaks.rs:5").unwrap();
        let second = stdout.find("basic_leaks.rs:7").unwrap();
        assert!(first < second, "Sites out of order:\n{stdout}");
    }

    // HEAPGUARD_FORMAT=json cargo run -p test-heapguard --example basic_leaks
    #[test]
    fn test_format_from_env() {
        let output = run_example("basic_leaks", &[], &[("HEAPGUARD_FORMAT", "json")]);
        assert_success(&output);

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report: LeakReport = serde_json::from_str(stdout.trim())
            .unwrap_or_else(|e| panic!("Invalid JSON ({e}):\n{stdout}"));

        assert_eq!(report.total_blocks, 2);
        assert_eq!(report.total_bytes, 44);
        let sizes: Vec<usize> = report.sites.iter().map(|s| s.bytes).collect();
        assert_eq!(sizes, vec![11, 33]);
    }

    // cargo run -p test-heapguard --example basic_leaks --features off
    #[test]
    fn test_off_reports_nothing() {
        let output = run_example("basic_leaks", &["off"], &[]);
        assert_success(&output);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.trim().is_empty(), "Unexpected output:\n{stdout}");
    }

    // cargo run -p test-heapguard --example out_of_memory -- <family>
    #[test]
    fn test_out_of_memory_terminates() {
        let cases = [
            (
                "allocate",
                format!("out_of_memory.rs:12: out of memory requesting {} bytes", isize::MAX),
            ),
            (
                "zeroed",
                format!("out_of_memory.rs:7: out of memory requesting {} x 2 bytes", usize::MAX),
            ),
            (
                "reallocate",
                format!("out_of_memory.rs:10: out of memory requesting {} bytes", isize::MAX),
            ),
        ];

        for features in [&[][..], &["off"][..]] {
            for (family, expected) in &cases {
                let output = run_example_with_args("out_of_memory", features, &[], &[*family]);

                assert_eq!(
                    output.status.code(),
                    Some(heapguard::OUT_OF_MEMORY_EXIT_CODE),
                    "Unexpected status for {family} with features {features:?}.\n\nstderr:\n{}",
                    String::from_utf8_lossy(&output.stderr)
                );

                let stderr = String::from_utf8_lossy(&output.stderr);
                assert!(
                    stderr.contains(expected.as_str()),
                    "Expected:\n{expected}\n\nGot:\n{stderr}",
                );
                assert_eq!(stderr.matches("out of memory").count(), 1);
                assert!(!String::from_utf8_lossy(&output.stdout).contains("unreachable"));
            }
        }
    }

    // cargo run -p test-heapguard --example tolerant
    #[test]
    fn test_tolerant_exhaustion_is_silent() {
        let output = run_example("tolerant", &[], &[]);
        assert_success(&output);

        let stdout = String::from_utf8_lossy(&output.stdout);
        let expected = format!("recovered: failed to allocate {} bytes", isize::MAX);
        assert!(stdout.contains(&expected), "Expected:\n{expected}\n\nGot:\n{stdout}");
        assert!(stdout.contains("still running"));

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(!stderr.contains("[heapguard]"), "Unexpected diagnostic:\n{stderr}");
    }

    // cargo run -p test-heapguard --example double_free
    #[test]
    fn test_misuse_is_reported_and_survived() {
        let output = run_example("double_free", &[], &[]);
        assert_success(&output);

        let stderr = String::from_utf8_lossy(&output.stderr);
        let all_expected = [
            "double_free.rs:7: freeing unallocated block 0x",
            "double_free.rs:12: reallocating unallocated block 0x",
        ];
        for expected in all_expected {
            assert!(
                stderr.contains(expected),
                "Expected:\n{expected}\n\nGot:\n{stderr}",
            );
        }
        assert_eq!(stderr.matches("freeing unallocated block").count(), 1);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("still running"));
    }

    // cargo run -p test-heapguard --example clobber
    #[test]
    fn test_fresh_memory_is_clobbered() {
        let output = run_example("clobber", &[], &[]);
        assert_success(&output);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.contains("fresh: aa 55 aa 55 aa 55 aa 55"),
            "Got:\n{stdout}"
        );
    }

    // cargo run -p test-heapguard --example main_macro
    #[test]
    fn test_main_macro_reports_on_exit() {
        let output = run_example("main_macro", &[], &[]);
        assert_success(&output);

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        assert_eq!(lines.next(), Some("buffer len 0"));

        let json = lines.next().expect("Missing leak report");
        let report: LeakReport = serde_json::from_str(json)
            .unwrap_or_else(|e| panic!("Invalid JSON ({e}):\n{stdout}"));

        assert_eq!(report.total_blocks, 2);
        let lines_reported: Vec<u32> = report.sites.iter().map(|s| s.line).collect();
        assert_eq!(lines_reported, vec![7, 10]);
        assert_eq!(report.sites[1].bytes, "leaked label".len() + 1);
    }
}
