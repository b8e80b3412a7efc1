use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;

use TrimGO::job::{execute_job, spawn_job, CancelToken, JobConfig, NullProgress};
use TrimGO::ontology::annotations::SpeciesAnnotations;
use TrimGO::ontology::term::NameSpace;
use TrimGO::ontology::Ontology;
use TrimGO::parsers::obo_parser::{OboFile, OboTerm};

const BP_ROOT: u32 = 8150;
const MF_ROOT: u32 = 3674;

fn obo_record(id: u32, name: &str, namespace: NameSpace, is_a: &[u32]) -> OboTerm {
    OboTerm {
        id,
        name: name.to_string(),
        namespace: Some(namespace),
        is_a: is_a.to_vec(),
        ..OboTerm::default()
    }
}

// A small two-namespace ontology: a BP root with two branches of children
// and one MF branch, with annotation sizes shrinking down the tree.
fn small_world() -> (Ontology, SpeciesAnnotations) {
    let mut obo = OboFile::default();
    let bp = NameSpace::BiologicalProcess;
    let mf = NameSpace::MolecularFunction;

    obo.terms
        .insert(BP_ROOT, obo_record(BP_ROOT, "Biological process", bp, &[]));
    obo.terms
        .insert(MF_ROOT, obo_record(MF_ROOT, "Molecular function", mf, &[]));

    let mut sizes: FxHashMap<u32, usize> = FxHashMap::default();
    sizes.insert(BP_ROOT, 100_000);
    sizes.insert(MF_ROOT, 80_000);

    // Two BP branches: 100x are "signal transduction" flavors, 200x are
    // "chromosome organization" flavors.
    for (branch, base_name) in [(100u32, "Signal transduction"), (200u32, "Chromosome organization")] {
        obo.terms
            .insert(branch, obo_record(branch, base_name, bp, &[BP_ROOT]));
        sizes.insert(branch, 4_000 + branch as usize);
        for leaf in 1..=6u32 {
            let id = branch + leaf;
            let name = format!("{} variant {}", base_name, leaf);
            obo.terms.insert(id, obo_record(id, &name, bp, &[branch]));
            sizes.insert(id, 900 + (id as usize % 97) * 10);
        }
    }

    for leaf in 1..=4u32 {
        let id = 3800 + leaf;
        let name = format!("Binding activity {}", leaf);
        obo.terms.insert(id, obo_record(id, &name, mf, &[MF_ROOT]));
        sizes.insert(id, 1_500 + leaf as usize * 100);
    }

    let ontology = Ontology::from_obo(obo).unwrap();
    let annotations = SpeciesAnnotations::new(9606, "Homo sapiens".to_string(), sizes, &ontology);
    (ontology, annotations)
}

fn standard_input() -> String {
    let mut input = String::from("% generated list\n");
    for (index, id) in [101u32, 102, 103, 104, 201, 202, 203, 100, 3801, 3802]
        .iter()
        .enumerate()
    {
        input.push_str(&format!("GO:{:07}\t1e-{}\n", id, index + 4));
    }
    input
}

#[test]
fn full_pipeline_is_deterministic() {
    let (ontology, annotations) = small_world();
    let config = JobConfig::default();

    let first = execute_job(
        &standard_input(),
        &ontology,
        &annotations,
        config.clone(),
        &CancelToken::new(),
        &NullProgress,
    );
    let second = execute_job(
        &standard_input(),
        &ontology,
        &annotations,
        config,
        &CancelToken::new(),
        &NullProgress,
    );

    assert!(first.finished && second.finished);
    assert!(!first.report.has_user_errors());

    for (view_a, view_b) in first.views.iter().zip(second.views.iter()) {
        assert_eq!(view_a.terms.len(), view_b.terms.len());
        for (a, b) in view_a.terms.iter().zip(view_b.terms.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.dispensability.to_bits(), b.dispensability.to_bits());
            assert_eq!(a.dispensed_by_id, b.dispensed_by_id);
            assert_eq!(a.pc[0].to_bits(), b.pc[0].to_bits());
            assert_eq!(a.pc[1].to_bits(), b.pc[1].to_bits());
            assert_eq!(a.pc3[2].to_bits(), b.pc3[2].to_bits());
        }
    }
    assert_eq!(first.correlation, second.correlation);
}

#[test]
fn dispensability_bounds_and_dispenser_chains_hold() {
    let (ontology, annotations) = small_world();
    let job = execute_job(
        &standard_input(),
        &ontology,
        &annotations,
        JobConfig::default(),
        &CancelToken::new(),
        &NullProgress,
    );

    for view in &job.views {
        for term in &view.terms {
            assert!(
                term.dispensability.is_nan()
                    || (0.0..=1.0).contains(&term.dispensability)
            );
            if let Some(dispenser_id) = term.dispensed_by_id {
                let dispenser = view.term(dispenser_id).expect("dispenser is in the view");
                // The dispenser survived this bucket: it was either kept
                // outright or eliminated later, at a lower similarity.
                assert!(dispenser.dispensability <= term.dispensability + 1e-12);
            }
        }
    }
}

#[test]
fn cutoff_of_one_retains_every_term() {
    let (ontology, annotations) = small_world();
    let job = execute_job(
        &standard_input(),
        &ontology,
        &annotations,
        JobConfig::default(),
        &CancelToken::new(),
        &NullProgress,
    );
    for view in &job.views {
        assert_eq!(view.retained_count(1.0), view.terms.len());
    }
}

#[test]
fn single_term_namespace_skips_mds_quietly() {
    let (ontology, annotations) = small_world();
    let job = execute_job(
        "GO:0003801 1e-8\n",
        &ontology,
        &annotations,
        JobConfig::default(),
        &CancelToken::new(),
        &NullProgress,
    );
    assert!(job.finished);
    assert!(!job.report.has_user_errors());

    let mf = job
        .views
        .iter()
        .find(|view| view.namespace == NameSpace::MolecularFunction)
        .unwrap();
    assert_eq!(mf.terms.len(), 1);
    let term = &mf.terms[0];
    assert!(!term.pc[0].is_nan());
    assert_eq!(term.dispensability, 0.0);
}

#[test]
fn two_terms_copy_coordinates_from_distances() {
    let (ontology, annotations) = small_world();
    let job = execute_job(
        "GO:0003801 1e-8\nGO:0003802 1e-6\n",
        &ontology,
        &annotations,
        JobConfig {
            cutoff: 0.9,
            ..JobConfig::default()
        },
        &CancelToken::new(),
        &NullProgress,
    );
    assert!(!job.report.has_user_errors());

    let mf = job
        .views
        .iter()
        .find(|view| view.namespace == NameSpace::MolecularFunction)
        .unwrap();
    let retained: Vec<_> = mf.terms.iter().filter(|t| t.is_retained(0.9)).collect();
    for term in retained {
        assert!(!term.pc[0].is_nan());
        assert!(!term.pc3[0].is_nan());
    }
}

#[test]
fn empty_input_reports_and_does_not_crash() {
    let (ontology, annotations) = small_world();
    let job = execute_job(
        "# nothing but comments\n! and more\n",
        &ontology,
        &annotations,
        JobConfig::default(),
        &CancelToken::new(),
        &NullProgress,
    );
    assert!(job.finished);
    assert!(job.report.has_user_errors());
}

#[test]
fn graph_attributes_round_trip_through_js_export() {
    let (ontology, annotations) = small_world();
    let job = execute_job(
        &standard_input(),
        &ontology,
        &annotations,
        JobConfig::default(),
        &CancelToken::new(),
        &NullProgress,
    );
    let bp = &job.views[0];
    assert!(!bp.graph.nodes.is_empty());

    let script = TrimGO::export::js::graph_to_js(&bp.graph, "termGraph");
    let body = script
        .trim_start_matches("var termGraph = ")
        .trim_end()
        .trim_end_matches(';');
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap();

    let nodes = parsed["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), bp.graph.nodes.len());
    for (emitted, node) in nodes.iter().zip(&bp.graph.nodes) {
        let expected: f64 = node.attributes["PC_1"].parse().unwrap();
        assert_eq!(emitted["PC_1"].as_f64().unwrap(), expected);
        assert_eq!(
            emitted["description"].as_str().unwrap(),
            node.attributes["description"]
        );
    }
}

// A larger job under a 1 ms budget: the timer cancels the worker, the job
// still finishes with the timeout error and without panicking.
#[test]
fn timed_out_job_finishes_with_cancellation_error() {
    let mut obo = OboFile::default();
    let bp = NameSpace::BiologicalProcess;
    obo.terms
        .insert(BP_ROOT, obo_record(BP_ROOT, "Biological process", bp, &[]));
    let mut sizes: FxHashMap<u32, usize> = FxHashMap::default();
    sizes.insert(BP_ROOT, 1_000_000);

    let mut input = String::new();
    for index in 0..500u32 {
        let id = 10_000 + index;
        let name = format!("Process number {}", index);
        obo.terms.insert(id, obo_record(id, &name, bp, &[BP_ROOT]));
        sizes.insert(id, 500 + (index as usize % 211) * 7);
        input.push_str(&format!("GO:{:07} 1e-{}\n", id, (index % 40) + 3));
    }

    let ontology = Arc::new(Ontology::from_obo(obo).unwrap());
    let annotations = Arc::new(SpeciesAnnotations::new(
        1,
        "Synthetic".to_string(),
        sizes,
        &ontology,
    ));

    let handle = spawn_job(
        input,
        ontology,
        annotations,
        JobConfig {
            timeout: Some(Duration::from_millis(1)),
            ..JobConfig::default()
        },
        Arc::new(NullProgress),
    );
    let job = handle.wait();

    assert!(job.finished);
    assert!(job.report.has_user_errors());
    assert!(job
        .report
        .user_errors
        .iter()
        .any(|error| error.contains("timely fashion")));
}
