//! End-to-end simulation scenarios for both execution models.

use membrane_core::{Region, RegionId, Rule};
use membrane_engine::{BaseModel, RecordingSink, SimulationEvent, SymportAntiport};

fn objects_of(region: Option<&Region>) -> String {
    region.map(|r| r.objects.to_string()).unwrap_or_default()
}

// ─────────────────────────────────────────────
// Base model
// ─────────────────────────────────────────────

#[test]
fn rewriting_consumes_and_stages() {
    // Single region holding {a:2, b:1} with rules ab→cc(HERE) and a→dd(OUT).
    let mut model = BaseModel::from_structure_str("[aab]").unwrap();
    let root = model.system().root_id();
    model
        .mutate_region_rules(root, "ab -> HERE: cc\na -> OUT: dd")
        .unwrap();
    assert!(model.any_rule_applicable());

    let first = Rule::parse_base("ab -> HERE: cc").unwrap();
    model.apply(&first, root).unwrap();

    let region = model.system().region(root).unwrap();
    assert_eq!(region.objects.to_string(), "a");
    assert_eq!(region.new_objects.to_string(), "cc");
    assert!(model.any_rule_applicable());
}

#[test]
fn out_from_the_root_feeds_the_environment() {
    let mut model = BaseModel::from_structure_str("[aab]").unwrap();
    let root = model.system().root_id();
    model.mutate_region_rules(root, "a -> OUT: dd").unwrap();

    let rule = Rule::parse_base("a -> OUT: dd").unwrap();
    model.apply(&rule, root).unwrap();
    model.apply(&rule, root).unwrap();

    assert_eq!(objects_of(model.system().region(root)), "b");
    assert_eq!(model.get_result().to_string(), "dddd");
    // Only b is left; a→dd needs an a.
    assert!(!model.any_rule_applicable());
}

#[test]
fn ordinary_rules_reapply_until_starved() {
    // One step drains all three a's through a single rule: ordinary rules
    // stay in the selection pool after each application.
    let mut model = BaseModel::from_structure_str("[aaa]").unwrap();
    let root = model.system().root_id();
    model.mutate_region_rules(root, "a -> HERE: b").unwrap();

    model.simulate_step().unwrap();

    assert_eq!(objects_of(model.system().region(root)), "bbb");
    assert_eq!(model.system().step_count(), 1);
    assert!(!model.any_rule_applicable());
}

#[test]
fn inward_routing_requires_a_child() {
    let mut model = BaseModel::from_structure_str("[a[b]]").unwrap();
    let root = model.system().root_id();
    let child = root + 1;

    let rule = Rule::parse_base("a -> IN: ff").unwrap();
    assert!(model.is_applicable(&rule, root));
    // The child is a leaf: nothing to route inward to.
    let leaf_rule = Rule::parse_base("b -> IN: f").unwrap();
    assert!(!model.is_applicable(&leaf_rule, child));

    model.apply(&rule, root).unwrap();
    let child_region = model.system().region(child).unwrap();
    assert_eq!(child_region.new_objects.to_string(), "ff");
}

#[test]
fn dissolving_rule_never_fires_on_the_skin() {
    let mut model = BaseModel::from_structure_str("[z]").unwrap();
    let root = model.system().root_id();
    model.mutate_region_rules(root, "-> #").unwrap();

    let rule = Rule::parse_base("-> #").unwrap();
    assert!(rule.is_dissolving());
    assert!(!model.is_applicable(&rule, root));
    assert!(!model.any_rule_applicable());
}

#[test]
fn priority_resolves_to_the_weak_member() {
    // strong needs {c:2}, the region holds {c:1}: the pair is applicable
    // through its weak member and applying it must run the weak rule.
    let mut model = BaseModel::from_structure_str("[c]").unwrap();
    let root = model.system().root_id();
    let pair = Rule::parse_base("cc -> HERE: c > c -> HERE: d").unwrap();
    assert!(model.is_applicable(&pair, root));

    model.apply(&pair, root).unwrap();
    let region = model.system().region(root).unwrap();
    assert_eq!(region.objects.to_string(), "");
    assert_eq!(region.new_objects.to_string(), "d");
}

#[test]
fn dissolution_merges_into_the_parent_and_reparents() {
    // root → mid{z:2} → leaf{a:2 b:3}; both inner regions dissolve in step 1.
    let mut model = BaseModel::from_structure_str("[[zz[aabbb]]]").unwrap();
    let root = model.system().root_id();
    let mid = root + 1;
    let leaf = root + 2;
    model.mutate_region_rules(mid, "-> #").unwrap();
    model.mutate_region_rules(leaf, "-> #").unwrap();

    let sink = RecordingSink::new();
    model.subscribe(sink.clone());
    model.simulate_step().unwrap();

    assert_eq!(model.system().regions().len(), 1);
    assert_eq!(objects_of(model.system().region(root)), "aabbbzz");
    assert!(model.system().region(mid).is_none());
    assert!(!model.system().structure().contains(mid));
    assert!(!model.system().structure().contains(leaf));

    // Dissolutions are reported before the step completes, nothing after.
    let events = sink.events();
    let dissolved: Vec<RegionId> = events
        .iter()
        .filter_map(|e| match e {
            SimulationEvent::RegionDissolved { region } => Some(*region),
            _ => None,
        })
        .collect();
    assert_eq!(dissolved, vec![mid, leaf]);
    assert!(matches!(
        events.last(),
        Some(SimulationEvent::StepCompleted { step: 1 })
    ));
}

#[test]
fn dissolution_reparents_the_survivors() {
    // root → mid → {leaf_a{d:2 e:1}, leaf_b}; only mid dissolves, its
    // children are adopted by the root.
    let mut model = BaseModel::from_structure_str("[[ [ddd] [e] ]]").unwrap();
    let root = model.system().root_id();
    let mid = root + 1;
    let leaf_a = root + 2;
    let leaf_b = root + 3;
    model.mutate_region_rules(mid, "-> #").unwrap();

    model.simulate_step().unwrap();

    let tree = model.system().structure();
    assert_eq!(tree.children_of(root).unwrap(), &[leaf_a, leaf_b]);
    assert_eq!(tree.parent_of(leaf_a).unwrap(), Some(root));
    assert_eq!(objects_of(model.system().region(leaf_a)), "ddd");
    assert_eq!(model.system().regions().len(), 3);
}

#[test]
fn exhausted_model_reports_finished_only() {
    let mut model = BaseModel::from_structure_str("[a]").unwrap();
    let sink = RecordingSink::new();
    model.subscribe(sink.clone());

    model.simulate_step().unwrap();

    assert_eq!(
        sink.take(),
        vec![SimulationEvent::SimulationFinished { result: String::new() }]
    );
    assert_eq!(model.system().step_count(), 0);

    model.simulate_computation(None).unwrap();
    let events = sink.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SimulationEvent::SimulationFinished { .. }));
}

#[test]
fn computation_runs_to_quiescence() {
    let mut model = BaseModel::from_structure_str("[aaab]").unwrap();
    let root = model.system().root_id();
    model
        .mutate_region_rules(root, "a -> OUT: c\nb -> HERE: b b")
        .unwrap();

    // b→bb never starves, so the bound is what stops the run.
    model.simulate_computation(Some(5)).unwrap();
    assert_eq!(model.system().step_count(), 5);
    assert_eq!(model.get_result().to_string(), "ccc");
}

#[test]
fn seeded_runs_are_reproducible() {
    let build = || {
        let mut model = BaseModel::from_structure_str("[aaabb[c][d]]").unwrap();
        let root = model.system().root_id();
        model
            .mutate_region_rules(root, "a -> IN: x\nb -> IN: y\nab -> HERE: z")
            .unwrap();
        model
    };

    let snapshot = |model: &BaseModel| -> Vec<(RegionId, String, String)> {
        model
            .system()
            .regions()
            .values()
            .map(|r| (r.id, r.objects.to_string(), r.new_objects.to_string()))
            .collect()
    };

    let mut one = build();
    let mut two = build();
    one.seed(42);
    two.seed(42);
    one.simulate_computation(Some(10)).unwrap();
    two.simulate_computation(Some(10)).unwrap();

    assert_eq!(snapshot(&one), snapshot(&two));
    assert_eq!(one.system().step_count(), two.system().step_count());
}

// ─────────────────────────────────────────────
// Symport/antiport
// ─────────────────────────────────────────────

#[test]
fn symport_in_pulls_from_the_parent() {
    let mut model = SymportAntiport::from_structure_str("[ab{#}]").unwrap();
    let root = model.system().root_id();
    let inner = model.output_id();
    model.mutate_region_rules(inner, "IN: ab").unwrap();

    model.simulate_step().unwrap();

    assert_eq!(objects_of(model.system().region(root)), "");
    assert_eq!(objects_of(model.system().region(inner)), "ab");
    assert!(!model.any_rule_applicable());
    assert_eq!(model.get_result().to_string(), "ab");
}

#[test]
fn non_root_antiport_stages_deliveries() {
    let mut model = SymportAntiport::from_structure_str("[a{#b}]").unwrap();
    let root = model.system().root_id();
    let inner = model.output_id();
    model.mutate_region_rules(inner, "IN:a OUT:b").unwrap();

    let rule = Rule::parse_transport("IN:a OUT:b").unwrap();
    assert!(model.is_applicable(&rule, inner));
    model.apply(&rule, inner).unwrap();

    // Removals are immediate on both regions, deliveries are staged.
    let inner_region = model.system().region(inner).unwrap();
    let root_region = model.system().region(root).unwrap();
    assert_eq!(inner_region.objects.to_string(), "");
    assert_eq!(inner_region.new_objects.to_string(), "a");
    assert_eq!(root_region.objects.to_string(), "");
    assert_eq!(root_region.new_objects.to_string(), "b");

    // A full step merges the staged deliveries and the swap is complete.
    let mut stepped = SymportAntiport::from_structure_str("[a{#b}]").unwrap();
    let root = stepped.system().root_id();
    let inner = stepped.output_id();
    stepped.mutate_region_rules(inner, "IN:a OUT:b").unwrap();
    stepped.simulate_computation(Some(10)).unwrap();
    assert_eq!(stepped.get_result().to_string(), "a");
    assert_eq!(objects_of(stepped.system().region(root)), "b");
}

#[test]
fn root_antiport_round_trips_the_environment() {
    // 'c' is in infinite supply; the skin swaps its 'a' for a 'c' at once.
    let mut model = SymportAntiport::from_structure_str("c[a#]").unwrap();
    let root = model.system().root_id();
    assert_eq!(model.output_id(), root);
    assert!(model.system().environment().is_infinite('c'));
    model.mutate_region_rules(root, "IN:c OUT:a").unwrap();

    let rule = Rule::parse_transport("IN:c OUT:a").unwrap();
    model.apply(&rule, root).unwrap();

    // Fully immediate: no staging on the root for an environment swap.
    let region = model.system().region(root).unwrap();
    assert_eq!(region.objects.to_string(), "c");
    assert!(region.new_objects.is_empty());
    // The exported 'a' is finite and accumulates outside.
    assert_eq!(model.system().environment().objects().count('a'), 1);

    model.simulate_computation(Some(10)).unwrap();
    assert_eq!(model.get_result().to_string(), "c");
}

#[test]
fn each_transport_rule_fires_at_most_once_per_visit() {
    // {a:3} in the parent, one IN:a rule in the child: a single step moves
    // exactly one 'a' — drawn indices leave the pool immediately.
    let mut model = SymportAntiport::from_structure_str("[aaa{#}]").unwrap();
    let root = model.system().root_id();
    let inner = model.output_id();
    model.mutate_region_rules(inner, "IN: a").unwrap();

    model.simulate_step().unwrap();
    assert_eq!(objects_of(model.system().region(inner)), "a");
    assert_eq!(objects_of(model.system().region(root)), "aa");

    model.simulate_step().unwrap();
    model.simulate_step().unwrap();
    assert_eq!(objects_of(model.system().region(inner)), "aaa");
    assert!(!model.any_rule_applicable());
}

#[test]
fn mutating_objects_and_rules_notifies() {
    let mut model = SymportAntiport::from_structure_str("[a{#b}]").unwrap();
    let root = model.system().root_id();
    let sink = RecordingSink::new();
    model.subscribe(sink.clone());

    model.mutate_region_objects(root, "xy z").unwrap();
    model.mutate_region_rules(root, "OUT: x").unwrap();

    assert_eq!(
        sink.take(),
        vec![
            SimulationEvent::ObjectsChanged { region: root, objects: "xyz".into() },
            SimulationEvent::RulesChanged { region: root, rules: "OUT: x".into() },
        ]
    );

    assert!(model.mutate_region_objects(99, "a").is_err());
    assert!(model.mutate_region_rules(root, "a -> HERE: b").is_err());
}
