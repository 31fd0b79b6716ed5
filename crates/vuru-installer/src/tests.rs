use super::*;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use vuru_core::Index;
use vuru_registry::{CacheLayout, TemplateSource};

use crate::xbps::{install_command, remove_command};

const ARCH: &str = "x86_64";

#[test]
fn parse_installed_line_splits_on_last_hyphen() {
    assert_eq!(
        parse_installed_line("ii ferdium-7.0.1_1 All your services in one place"),
        Some(InstalledPackage {
            name: "ferdium".to_string(),
            version: "7.0.1_1".to_string(),
        })
    );
    assert_eq!(
        parse_installed_line("ii visual-studio-code-1.96.2_1 Code editing. Redefined."),
        Some(InstalledPackage {
            name: "visual-studio-code".to_string(),
            version: "1.96.2_1".to_string(),
        })
    );
}

#[test]
fn parse_installed_line_tolerates_extra_whitespace_and_missing_description() {
    assert_eq!(
        parse_installed_line("  ii\tlibfoo-2.0_3  \n"),
        Some(InstalledPackage {
            name: "libfoo".to_string(),
            version: "2.0_3".to_string(),
        })
    );
    assert_eq!(
        parse_installed_line("uu gtk+3-3.24.43_1 The GTK+ toolkit")
            .map(|package| package.name),
        Some("gtk+3".to_string())
    );
}

#[test]
fn parse_installed_line_rejects_malformed_lines() {
    for line in [
        "",
        "   ",
        "ii",
        "ii nohyphen description",
        "ii trailing- description",
        "ii -1.0_1 description",
        "ii -",
    ] {
        assert_eq!(parse_installed_line(line), None, "{line:?} should not parse");
    }
}

#[test]
fn parse_installed_list_skips_unparseable_lines() {
    let output = "ii ferdium-7.0.1_1 Messaging\n\nii broken\nii zoom-6.2.0_1 Meetings\n";
    assert_eq!(
        parse_installed_list(output),
        vec![
            InstalledPackage {
                name: "ferdium".to_string(),
                version: "7.0.1_1".to_string(),
            },
            InstalledPackage {
                name: "zoom".to_string(),
                version: "6.2.0_1".to_string(),
            },
        ]
    );
}

#[test]
fn parse_pkgver_output_reads_matching_package() {
    let output = "architecture: x86_64\ninstall-date: 2025-01-02 10:00 UTC\npkgver: ferdium-7.0.1_1\nstate: installed\n";
    assert_eq!(
        parse_pkgver_output(output, "ferdium").as_deref(),
        Some("7.0.1_1")
    );
    assert_eq!(parse_pkgver_output(output, "zoom"), None);
    assert_eq!(parse_pkgver_output("state: installed\n", "ferdium"), None);
}

#[test]
fn cmpver_exit_codes_map_to_strictly_greater() {
    assert!(cmpver_is_greater(Some(1)).expect("1 is greater"));
    assert!(!cmpver_is_greater(Some(0)).expect("0 is equal"));
    assert!(!cmpver_is_greater(Some(255)).expect("255 is smaller"));
    assert!(cmpver_is_greater(Some(2)).is_err());
    assert!(cmpver_is_greater(None).is_err());
}

#[test]
fn install_command_uses_fixed_argument_vector() {
    let command = install_command(&InstallRequest {
        repo_url: "https://example.test/editors-x86_64-current".to_string(),
        package: "visual-studio-code".to_string(),
        mode: InstallMode::Install,
        assume_yes: false,
    })
    .expect("must build");
    assert_eq!(command.get_program(), "sudo");
    assert_eq!(
        command_args(&command),
        vec![
            "xbps-install",
            "-R",
            "https://example.test/editors-x86_64-current",
            "-S",
            "visual-studio-code"
        ]
    );

    let command = install_command(&InstallRequest {
        repo_url: "https://example.test/misc".to_string(),
        package: "ferdium".to_string(),
        mode: InstallMode::Upgrade,
        assume_yes: true,
    })
    .expect("must build");
    assert_eq!(
        command_args(&command),
        vec![
            "xbps-install",
            "-R",
            "https://example.test/misc",
            "-Su",
            "-y",
            "ferdium"
        ]
    );
}

#[test]
fn install_command_rejects_unsafe_inputs() {
    let err = install_command(&InstallRequest {
        repo_url: "https://example.test/$(reboot)".to_string(),
        package: "ferdium".to_string(),
        mode: InstallMode::Install,
        assume_yes: false,
    })
    .expect_err("unsafe repo must fail");
    assert!(err.to_string().contains("invalid-url"));

    let err = install_command(&InstallRequest {
        repo_url: "https://example.test/misc".to_string(),
        package: "-f".to_string(),
        mode: InstallMode::Install,
        assume_yes: false,
    })
    .expect_err("option-looking package must fail");
    assert!(err.to_string().contains("invalid-identifier"));
}

#[test]
fn remove_command_passes_all_packages() {
    let command = remove_command(&["ferdium".to_string(), "zoom".to_string()], true)
        .expect("must build");
    assert_eq!(command.get_program(), "sudo");
    assert_eq!(
        command_args(&command),
        vec!["xbps-remove", "-R", "-y", "ferdium", "zoom"]
    );

    assert!(remove_command(&[], false).is_err());
    let err = remove_command(&["../etc".to_string()], false).expect_err("must fail");
    assert!(err.to_string().contains("invalid-identifier"));
}

#[test]
fn diff_without_cached_template_is_full_content() {
    assert_eq!(generate_diff(None, "hello\n").expect("must diff"), "hello\n");
}

#[test]
fn diff_of_identical_templates_is_empty() {
    assert_eq!(generate_diff(Some("a\n"), "a\n").expect("must diff"), "");
}

#[test]
fn diff_of_changed_templates_is_unified() {
    let diff = generate_diff(
        Some("pkgname=ferdium\nversion=7.0.0\n"),
        "pkgname=ferdium\nversion=7.0.1\n",
    )
    .expect("must diff");
    assert!(diff.contains("--- a/template"), "{diff}");
    assert!(diff.contains("+++ b/template"), "{diff}");
    assert!(diff.contains("-version=7.0.0"), "{diff}");
    assert!(diff.contains("+version=7.0.1"), "{diff}");
}

#[test]
fn install_review_for_unchanged_template_has_no_body() {
    let document = install_review_document("ferdium", Some("same\n"), "same\n").expect("document");
    assert_eq!(
        document.heading,
        "Template for ferdium unchanged since last install."
    );
    assert_eq!(document.body, None);
    assert_eq!(document.prompt, "Proceed with installation? [Y/n]");
}

#[test]
fn install_review_for_first_install_shows_full_template() {
    let document = install_review_document("ferdium", None, "pkgname=ferdium\n").expect("document");
    assert!(document.heading.contains("New package ferdium"));
    assert_eq!(document.body.as_deref(), Some("pkgname=ferdium\n"));
}

#[test]
fn batch_review_lists_summary_and_sections() {
    let candidates = vec![
        candidate("ferdium", "7.0.0_1", "7.0.1_1", Some("same\n"), Some("same\n")),
        candidate("zoom", "6.1.0_1", "6.2.0_1", None, Some("pkgname=zoom\n")),
    ];

    let document = batch_review_document(&candidates).expect("document");
    let body = document.body.expect("batch review has a body");

    assert!(body.starts_with("VUP Package Upgrade Review\n==========================\n\n"));
    assert!(body.contains("2 package(s) to upgrade:"));
    assert!(body.contains("  [1] ferdium: 7.0.0_1 -> 7.0.1_1\n"));
    assert!(body.contains("  [2] zoom: 6.1.0_1 -> 6.2.0_1\n"));
    assert!(body.contains("[1/2] ferdium: 7.0.0_1 -> 7.0.1_1\n"));
    assert!(body.contains("(Template unchanged since last install)"));
    assert!(body.contains("[2/2] zoom: 6.1.0_1 -> 6.2.0_1\n"));
    assert!(body.contains("(New package - showing full template)\n\npkgname=zoom\n"));
    assert_eq!(body.matches('━').count(), 2 * 2 * 60);
    assert!(body.contains("2 package(s) to upgrade:\n\n  [1] ferdium"));
    let separator = "━".repeat(60);
    assert!(body.contains(&format!(
        "\n\n{separator}\n[1/2] ferdium: 7.0.0_1 -> 7.0.1_1\n{separator}\n\n(Template unchanged since last install)\n\n{separator}\n"
    )));
    assert_eq!(document.prompt, "Proceed with 2 upgrade(s)? [Y/n]");
}

#[test]
fn scan_finds_strictly_newer_packages_only() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "1.1_1"), ("pkgb", "2.0_1"), ("pkgc", "3.0_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1.0_1"), ("pkgb", "2.0_1"), ("pkgc", "3.1_1")]);
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);

    let result = planner.scan(&mut |_| {}).expect("scan must succeed");

    assert!(!result.truncated);
    assert_eq!(result.candidates.len(), 1);
    let found = &result.candidates[0];
    assert_eq!(found.name, "pkga");
    assert_eq!(found.installed_version, "1.0_1");
    assert_eq!(found.new_version, "1.1_1");
    assert_eq!(found.category, "misc");
    assert_eq!(found.repo_url, "https://example.test/misc-x86_64");
}

#[test]
fn scan_skips_packages_unknown_or_unavailable_for_arch() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = Index::from_json_str(
        r#"{
          "armonly": {"version": "2.0_1", "category": "misc", "repo_urls": {"aarch64": "https://example.test/a"}},
          "broken": {"version": "2.0_1", "repo_urls": {"x86_64": "https://example.test/b"}}
        }"#,
    )
    .expect("index");
    let xbps = FakeXbps::new(&[("armonly", "1.0_1"), ("broken", "1.0_1"), ("base-system", "0.1_1")]);
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);

    let result = planner.scan(&mut |_| {}).expect("scan must succeed");
    assert!(result.candidates.is_empty());
    assert_eq!(xbps.compare_calls.borrow().len(), 0);
}

#[test]
fn scan_stops_at_batch_limit_and_reports_truncation() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1"), ("pkgb", "2_1"), ("pkgc", "2_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1_1"), ("pkgb", "1_1"), ("pkgc", "1_1")]);
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout)
        .with_max_batch(2)
        .expect("limit is valid");

    let mut truncations = Vec::new();
    let result = planner
        .scan(&mut |event| {
            if let UpgradeEvent::ScanTruncated { limit } = event {
                truncations.push(limit);
            }
        })
        .expect("scan must succeed");

    assert!(result.truncated);
    assert_eq!(
        result
            .candidates
            .iter()
            .map(|candidate| candidate.name.as_str())
            .collect::<Vec<_>>(),
        vec!["pkga", "pkgb"]
    );
    assert_eq!(truncations, vec![2]);
}

#[test]
fn batch_limit_must_be_positive() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = Index::default();
    let xbps = FakeXbps::new(&[]);
    let templates = FakeTemplates::default();
    let result = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout).with_max_batch(0);
    assert!(result.is_err());
}

#[test]
fn scan_reports_comparison_failures_and_continues() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "bogus"), ("pkgb", "2_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1_1"), ("pkgb", "1_1")]);
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);

    let mut failed = Vec::new();
    let result = planner
        .scan(&mut |event| {
            if let UpgradeEvent::CompareFailed { name, .. } = event {
                failed.push(name.to_string());
            }
        })
        .expect("scan must succeed");

    assert_eq!(failed, vec!["pkga"]);
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].name, "pkgb");
}

#[test]
fn apply_continues_past_failed_package() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1"), ("pkgb", "2_1"), ("pkgc", "2_1")]);
    let mut xbps = FakeXbps::new(&[("pkga", "1_1"), ("pkgb", "1_1"), ("pkgc", "1_1")]);
    xbps.failing_installs.insert("pkgb".to_string());
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);

    let candidates = vec![
        candidate("pkga", "1_1", "2_1", None, None),
        candidate("pkgb", "1_1", "2_1", None, None),
        candidate("pkgc", "1_1", "2_1", None, None),
    ];
    let mut failed = Vec::new();
    let summary = planner.apply(&candidates, true, &mut |event| {
        if let UpgradeEvent::ApplyFailed { name, .. } = event {
            failed.push(name.to_string());
        }
    });

    assert_eq!(
        summary,
        ApplySummary {
            upgraded: 2,
            unchanged: 0,
            errors: 1,
        }
    );
    assert_eq!(failed, vec!["pkgb"]);
    assert_eq!(xbps.requested_packages(), vec!["pkga", "pkgb", "pkgc"]);
    assert!(xbps
        .requests
        .borrow()
        .iter()
        .all(|request| request.mode == InstallMode::Upgrade && request.assume_yes));
}

#[test]
fn apply_counts_only_verified_version_changes() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1"), ("pkgb", "2_1")]);
    let mut xbps = FakeXbps::new(&[("pkga", "1_1"), ("pkgb", "1_1")]);
    xbps.sticky.insert("pkga".to_string());
    xbps.failing_queries.insert("pkgb".to_string());
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);

    let candidates = vec![
        candidate("pkga", "1_1", "2_1", None, Some("new a\n")),
        candidate("pkgb", "1_1", "2_1", None, Some("new b\n")),
    ];
    let mut verify_failures = Vec::new();
    let summary = planner.apply(&candidates, false, &mut |event| {
        if let UpgradeEvent::VerifyFailed { name, .. } = event {
            verify_failures.push(name.to_string());
        }
    });

    assert_eq!(
        summary,
        ApplySummary {
            upgraded: 0,
            unchanged: 1,
            errors: 0,
        }
    );
    assert_eq!(verify_failures, vec!["pkgb"]);
    assert_eq!(layout.read_template("pkga").expect("read"), None);
    assert_eq!(layout.read_template("pkgb").expect("read"), None);
}

#[test]
fn run_approved_upgrades_and_refreshes_template_cache() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    layout
        .save_template("pkga", "old a\n")
        .expect("seed cached template");
    let index = index_with(&[("pkga", "2_1"), ("pkgb", "2_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1_1"), ("pkgb", "1_1")]);
    let templates = FakeTemplates::with(&[("pkga", "old a\n"), ("pkgb", "new b\n")]);
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);
    let mut gate = ScriptedGate::answering(true);

    let mut fetched = Vec::new();
    let report = planner
        .run(false, &mut gate, &mut |event| {
            if let UpgradeEvent::TemplateFetched { name } = event {
                fetched.push(name.to_string());
            }
        })
        .expect("run must succeed");

    assert_eq!(
        report,
        UpgradeReport {
            candidates: 2,
            upgraded: 2,
            unchanged: 0,
            errors: 0,
            truncated: false,
            cancelled: false,
        }
    );
    assert_eq!(fetched, vec!["pkga", "pkgb"]);
    assert_eq!(gate.documents.len(), 1);
    let body = gate.documents[0].body.as_deref().expect("body");
    assert!(body.contains("[1/2] pkga: 1_1 -> 2_1"));
    assert!(body.contains("(Template unchanged since last install)"));
    assert!(body.contains("(New package - showing full template)"));
    assert_eq!(
        layout.read_template("pkgb").expect("read").as_deref(),
        Some("new b\n")
    );
    assert!(xbps
        .requests
        .borrow()
        .iter()
        .all(|request| !request.assume_yes));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn run_declined_review_applies_nothing() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1_1")]);
    let templates = FakeTemplates::with(&[("pkga", "new a\n")]);
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);
    let mut gate = ScriptedGate::answering(false);

    let report = planner
        .run(false, &mut gate, &mut |_| {})
        .expect("declining is not an error");

    assert!(report.cancelled);
    assert_eq!(report.candidates, 1);
    assert_eq!(report.upgraded, 0);
    assert!(xbps.requests.borrow().is_empty());
    assert_eq!(layout.read_template("pkga").expect("read"), None);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn run_with_assume_yes_skips_fetch_and_review() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1_1")]);
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);
    let mut gate = ScriptedGate::answering(false);

    let report = planner
        .run(true, &mut gate, &mut |_| {})
        .expect("run must succeed");

    assert_eq!(report.upgraded, 1);
    assert!(gate.documents.is_empty());
    assert!(templates.calls.borrow().is_empty());
    assert!(!layout.templates_dir().exists());
}

#[test]
fn run_aborts_when_any_template_fetch_fails() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1"), ("pkgb", "2_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1_1"), ("pkgb", "1_1")]);
    let templates = FakeTemplates::with(&[("pkga", "new a\n")]);
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);
    let mut gate = ScriptedGate::answering(true);

    let err = planner
        .run(false, &mut gate, &mut |_| {})
        .expect_err("fetch failure must abort");

    assert!(format!("{err:#}").contains("template-fetch-failed"));
    assert!(gate.documents.is_empty());
    assert!(xbps.requests.borrow().is_empty());
}

#[test]
fn run_with_nothing_to_upgrade_reports_empty() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "1_1")]);
    let xbps = FakeXbps::new(&[("pkga", "1_1")]);
    let templates = FakeTemplates::default();
    let planner = UpgradePlanner::new(&index, ARCH, &xbps, &templates, &layout);
    let mut gate = ScriptedGate::answering(true);

    let report = planner
        .run(false, &mut gate, &mut |_| {})
        .expect("run must succeed");
    assert_eq!(report, UpgradeReport::default());
    assert!(gate.documents.is_empty());
}

#[test]
fn resolve_for_install_distinguishes_unavailable_states() {
    let index = Index::from_json_str(
        r#"{
          "ferdium": {"version": "7.0.1_1", "category": "communication", "repo_urls": {"x86_64": "https://example.test/c"}},
          "armonly": {"version": "1.0_1", "category": "misc", "repo_urls": {"aarch64": "https://example.test/a"}},
          "broken": {"version": "1.0_1", "repo_urls": {"x86_64": "https://example.test/b"}}
        }"#,
    )
    .expect("index");

    assert_eq!(
        resolve_for_install(&index, "ferdium", ARCH)
            .expect("must resolve")
            .repo_url,
        "https://example.test/c"
    );
    for (name, code) in [
        ("missing", "package-not-found"),
        ("broken", "package-metadata-incomplete"),
        ("armonly", "package-unsupported-arch"),
        ("../x", "invalid-identifier"),
    ] {
        let err = resolve_for_install(&index, name, ARCH).expect_err("must fail");
        assert!(err.to_string().contains(code), "{name}: {err}");
    }
}

#[test]
fn install_flow_caches_template_after_successful_install() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1")]);
    let xbps = FakeXbps::new(&[]);
    let templates = FakeTemplates::with(&[("pkga", "pkgname=pkga\n")]);
    let flow = InstallFlow {
        layout: &layout,
        templates: &templates,
        packages: &xbps,
        arch: ARCH,
    };
    let mut gate = ScriptedGate::answering(true);

    let outcome = flow
        .install(&index, "pkga", false, &mut gate)
        .expect("install must succeed");

    match outcome {
        InstallOutcome::Installed {
            package,
            template_cache_warning,
        } => {
            assert_eq!(package.name, "pkga");
            assert_eq!(template_cache_warning, None);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(gate.documents.len(), 1);
    assert_eq!(gate.documents[0].body.as_deref(), Some("pkgname=pkga\n"));
    assert_eq!(
        xbps.requests.borrow()[0],
        InstallRequest {
            repo_url: "https://example.test/misc-x86_64".to_string(),
            package: "pkga".to_string(),
            mode: InstallMode::Install,
            assume_yes: false,
        }
    );
    assert_eq!(
        layout.read_template("pkga").expect("read").as_deref(),
        Some("pkgname=pkga\n")
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_flow_declined_review_is_not_an_error() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1")]);
    let xbps = FakeXbps::new(&[]);
    let templates = FakeTemplates::with(&[("pkga", "pkgname=pkga\n")]);
    let flow = InstallFlow {
        layout: &layout,
        templates: &templates,
        packages: &xbps,
        arch: ARCH,
    };
    let mut gate = ScriptedGate::answering(false);

    let outcome = flow
        .install(&index, "pkga", false, &mut gate)
        .expect("declining is not an error");

    assert!(matches!(outcome, InstallOutcome::Declined { .. }));
    assert!(xbps.requests.borrow().is_empty());
    assert_eq!(layout.read_template("pkga").expect("read"), None);
}

#[test]
fn install_flow_failed_install_leaves_cache_untouched() {
    let root = test_cache_root();
    let layout = CacheLayout::new(&root);
    let index = index_with(&[("pkga", "2_1")]);
    let mut xbps = FakeXbps::new(&[]);
    xbps.failing_installs.insert("pkga".to_string());
    let templates = FakeTemplates::with(&[("pkga", "pkgname=pkga\n")]);
    let flow = InstallFlow {
        layout: &layout,
        templates: &templates,
        packages: &xbps,
        arch: ARCH,
    };
    let mut gate = ScriptedGate::answering(true);

    let err = flow
        .install(&index, "pkga", true, &mut gate)
        .expect_err("install failure must surface");

    assert!(err.to_string().contains("xbps-install pkga"));
    assert!(gate.documents.is_empty(), "assume_yes skips review");
    assert_eq!(layout.read_template("pkga").expect("read"), None);
}

#[derive(Default)]
struct FakeXbps {
    installed: Vec<InstalledPackage>,
    current: RefCell<BTreeMap<String, String>>,
    failing_installs: BTreeSet<String>,
    failing_queries: BTreeSet<String>,
    /// Packages whose version does not change after an upgrade.
    sticky: BTreeSet<String>,
    requests: RefCell<Vec<InstallRequest>>,
    compare_calls: RefCell<Vec<(String, String)>>,
}

impl FakeXbps {
    fn new(installed: &[(&str, &str)]) -> Self {
        let installed = installed
            .iter()
            .map(|(name, version)| InstalledPackage {
                name: name.to_string(),
                version: version.to_string(),
            })
            .collect::<Vec<_>>();
        let current = installed
            .iter()
            .map(|package| (package.name.clone(), package.version.clone()))
            .collect();
        Self {
            installed,
            current: RefCell::new(current),
            ..Self::default()
        }
    }

    fn requested_packages(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.package.clone())
            .collect()
    }
}

impl PackageManager for FakeXbps {
    fn installed_packages(&self) -> anyhow::Result<Vec<InstalledPackage>> {
        Ok(self.installed.clone())
    }

    fn installed_version(&self, name: &str) -> anyhow::Result<Option<String>> {
        if self.failing_queries.contains(name) {
            return Err(anyhow!("xbps-query {name}: status=exit status: 2"));
        }
        Ok(self.current.borrow().get(name).cloned())
    }

    fn version_is_newer(&self, candidate: &str, installed: &str) -> anyhow::Result<bool> {
        self.compare_calls
            .borrow_mut()
            .push((candidate.to_string(), installed.to_string()));
        let candidate = numeric_parts(candidate)?;
        let installed = numeric_parts(installed)?;
        Ok(candidate > installed)
    }

    fn install(&self, request: &InstallRequest) -> anyhow::Result<()> {
        self.requests.borrow_mut().push(request.clone());
        if self.failing_installs.contains(&request.package) {
            return Err(anyhow!(
                "xbps-install {}: status=exit status: 1",
                request.package
            ));
        }
        if !self.sticky.contains(&request.package) {
            let next = format!("next-{}", request.package);
            self.current
                .borrow_mut()
                .insert(request.package.clone(), next);
        }
        Ok(())
    }

    fn remove(&self, _packages: &[String], _assume_yes: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

fn numeric_parts(version: &str) -> anyhow::Result<Vec<u64>> {
    version
        .split(&['.', '_'][..])
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| anyhow!("unexpected exit code 2"))
        })
        .collect()
}

#[derive(Default)]
struct FakeTemplates {
    templates: BTreeMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl FakeTemplates {
    fn with(templates: &[(&str, &str)]) -> Self {
        Self {
            templates: templates
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_string()))
                .collect(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl TemplateSource for FakeTemplates {
    fn fetch_template(&self, category: &str, name: &str) -> anyhow::Result<String> {
        self.calls.borrow_mut().push(format!("{category}/{name}"));
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("template-fetch-failed: {category}/{name}"))
    }
}

struct ScriptedGate {
    answer: bool,
    documents: Vec<ReviewDocument>,
}

impl ScriptedGate {
    fn answering(answer: bool) -> Self {
        Self {
            answer,
            documents: Vec::new(),
        }
    }
}

impl ReviewGate for ScriptedGate {
    fn review(&mut self, document: &ReviewDocument) -> anyhow::Result<bool> {
        self.documents.push(document.clone());
        Ok(self.answer)
    }
}

fn index_with(packages: &[(&str, &str)]) -> Index {
    let entries = packages
        .iter()
        .map(|(name, version)| {
            format!(
                r#""{name}": {{"version": "{version}", "category": "misc", "repo_urls": {{"x86_64": "https://example.test/misc-x86_64"}}}}"#
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    Index::from_json_str(&format!("{{{entries}}}")).expect("test index must parse")
}

fn candidate(
    name: &str,
    installed_version: &str,
    new_version: &str,
    cached_template: Option<&str>,
    new_template: Option<&str>,
) -> UpgradeCandidate {
    UpgradeCandidate {
        name: name.to_string(),
        installed_version: installed_version.to_string(),
        new_version: new_version.to_string(),
        category: "misc".to_string(),
        repo_url: "https://example.test/misc-x86_64".to_string(),
        new_template: new_template.map(ToOwned::to_owned),
        cached_template: cached_template.map(ToOwned::to_owned),
    }
}

fn command_args(command: &std::process::Command) -> Vec<String> {
    command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

static TEST_CACHE_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_cache_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_CACHE_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "vuru-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
