//! Call-site expansion across direct calls, dynamic dispatch, extensions and
//! protocol conformance.

mod common;

use common::{occurrence, relation, unit, StoreFixture};
use sigil_core::{SymbolKind, SymbolOccurrenceRef, SymbolRoles};
use sigil_index::IndexSystem;

fn canonical(index: &IndexSystem, usr: &str) -> SymbolOccurrenceRef {
    let mut found = None;
    index.foreach_canonical_symbol_occurrence_by_usr(usr, |occ| {
        found = Some(occ.clone());
        true
    });
    found.unwrap_or_else(|| panic!("no canonical occurrence for {usr}"))
}

fn caller_lines(index: &IndexSystem, callee_usr: &str) -> (bool, Vec<u32>) {
    let callee = canonical(index, callee_usr);
    let mut lines = Vec::new();
    let completed = index.foreach_symbol_call_occurrence(&callee, |occ| {
        lines.push(occ.location().line);
        true
    });
    lines.sort_unstable();
    (completed, lines)
}

#[test]
fn direct_call_yields_the_call_site() {
    let fixture = StoreFixture::new();
    let main_x = fixture.source_file("main.x");
    fixture.write_unit(&unit(
        "main.o",
        "/build/main.o",
        vec![main_x.clone()],
        vec!["main.rec"],
    ));
    fixture.write_record(
        "main.rec",
        vec![
            occurrence(
                "s:foo",
                "foo",
                SymbolKind::Function,
                SymbolRoles::DEFINITION,
                &main_x,
                3,
            ),
            occurrence(
                "s:foo",
                "foo",
                SymbolKind::Function,
                SymbolRoles::CALL,
                &main_x,
                10,
            ),
        ],
    );
    let index = fixture.index();

    let (completed, lines) = caller_lines(&index, "s:foo");
    assert!(completed);
    assert_eq!(lines, vec![10]);
}

/// Class hierarchy `A <- B <- C`; the callee is `B.m` and the call site is
/// `a.m()` dispatched through the base class.
fn class_hierarchy_fixture(receiver_rel: Option<&str>) -> StoreFixture {
    let fixture = StoreFixture::new();
    let main_x = fixture.source_file("main.x");

    let mut occurrences = vec![
        // A <- B <- C, plus an unrelated class D.
        {
            let mut base = occurrence(
                "s:A",
                "A",
                SymbolKind::Class,
                SymbolRoles::REFERENCE,
                &main_x,
                1,
            );
            base.relations = vec![relation(
                SymbolRoles::REL_BASE_OF,
                "s:B",
                "B",
                SymbolKind::Class,
            )];
            base
        },
        {
            let mut base = occurrence(
                "s:B",
                "B",
                SymbolKind::Class,
                SymbolRoles::REFERENCE,
                &main_x,
                2,
            );
            base.relations = vec![relation(
                SymbolRoles::REL_BASE_OF,
                "s:C",
                "C",
                SymbolKind::Class,
            )];
            base
        },
        // A.m definition.
        {
            let mut def = occurrence(
                "s:A.m",
                "m",
                SymbolKind::InstanceMethod,
                SymbolRoles::DEFINITION | SymbolRoles::DYNAMIC,
                &main_x,
                4,
            );
            def.relations = vec![relation(
                SymbolRoles::REL_CHILD_OF,
                "s:A",
                "A",
                SymbolKind::Class,
            )];
            def
        },
        // B.m overrides A.m.
        {
            let mut def = occurrence(
                "s:B.m",
                "m",
                SymbolKind::InstanceMethod,
                SymbolRoles::DEFINITION | SymbolRoles::DYNAMIC,
                &main_x,
                8,
            );
            def.relations = vec![
                relation(SymbolRoles::REL_CHILD_OF, "s:B", "B", SymbolKind::Class),
                relation(
                    SymbolRoles::REL_OVERRIDE_OF,
                    "s:A.m",
                    "m",
                    SymbolKind::InstanceMethod,
                ),
            ];
            def
        },
    ];

    // The call site `a.m()`: statically a call to A.m, dynamically dispatched.
    let mut call = occurrence(
        "s:A.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::CALL | SymbolRoles::DYNAMIC,
        &main_x,
        20,
    );
    if let Some(receiver_usr) = receiver_rel {
        call.relations = vec![relation(
            SymbolRoles::REL_RECEIVED_BY,
            receiver_usr,
            receiver_usr.trim_start_matches("s:"),
            SymbolKind::Class,
        )];
    }
    occurrences.push(call);

    fixture.write_unit(&unit(
        "main.o",
        "/build/main.o",
        vec![main_x],
        vec!["main.rec"],
    ));
    fixture.write_record("main.rec", occurrences);
    fixture
}

#[test]
fn dynamic_call_through_base_class_is_a_candidate() {
    let fixture = class_hierarchy_fixture(Some("s:A"));
    let index = fixture.index();

    let (completed, lines) = caller_lines(&index, "s:B.m");
    assert!(completed);
    assert_eq!(lines, vec![20]);
}

#[test]
fn dynamic_call_with_unrelated_receiver_is_filtered_out() {
    let fixture = class_hierarchy_fixture(Some("s:D"));
    let index = fixture.index();

    let (completed, lines) = caller_lines(&index, "s:B.m");
    assert!(completed);
    assert!(lines.is_empty());
}

#[test]
fn dynamic_call_with_unknown_receiver_is_a_candidate() {
    // No received-by relation on the call site: the static receiver is
    // unknown, so every class in the hierarchy is a candidate.
    let fixture = class_hierarchy_fixture(None);
    let index = fixture.index();

    let (completed, lines) = caller_lines(&index, "s:B.m");
    assert!(completed);
    assert_eq!(lines, vec![20]);
}

#[test]
fn extension_receiver_is_rewritten_to_the_extended_type() {
    let fixture = StoreFixture::new();
    let main_x = fixture.source_file("main.x");

    let mut extended = occurrence(
        "s:T",
        "T",
        SymbolKind::Class,
        SymbolRoles::REFERENCE,
        &main_x,
        1,
    );
    extended.relations = vec![relation(
        SymbolRoles::REL_EXTENDED_BY,
        "s:T+Ext",
        "T+Ext",
        SymbolKind::Extension,
    )];

    let mut base = occurrence(
        "s:TBase",
        "TBase",
        SymbolKind::Class,
        SymbolRoles::REFERENCE,
        &main_x,
        2,
    );
    base.relations = vec![relation(
        SymbolRoles::REL_BASE_OF,
        "s:T",
        "T",
        SymbolKind::Class,
    )];

    let base_def = occurrence(
        "s:TBase.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::DEFINITION | SymbolRoles::DYNAMIC,
        &main_x,
        4,
    );

    // T.m lives in the extension and overrides TBase.m.
    let mut override_def = occurrence(
        "s:T.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::DEFINITION | SymbolRoles::DYNAMIC,
        &main_x,
        8,
    );
    override_def.relations = vec![
        relation(
            SymbolRoles::REL_CHILD_OF,
            "s:T+Ext",
            "T+Ext",
            SymbolKind::Extension,
        ),
        relation(
            SymbolRoles::REL_OVERRIDE_OF,
            "s:TBase.m",
            "m",
            SymbolKind::InstanceMethod,
        ),
    ];

    let mut call = occurrence(
        "s:TBase.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::CALL | SymbolRoles::DYNAMIC,
        &main_x,
        20,
    );
    call.relations = vec![relation(
        SymbolRoles::REL_RECEIVED_BY,
        "s:T",
        "T",
        SymbolKind::Class,
    )];

    fixture.write_unit(&unit(
        "main.o",
        "/build/main.o",
        vec![main_x],
        vec!["main.rec"],
    ));
    fixture.write_record(
        "main.rec",
        vec![extended, base, base_def, override_def, call],
    );
    let index = fixture.index();

    // Without the extension-to-type rewrite the receiver class set would be
    // `[T+Ext]` and the call on `T` would not match.
    let (completed, lines) = caller_lines(&index, "s:T.m");
    assert!(completed);
    assert_eq!(lines, vec![20]);
}

fn protocol_fixture() -> StoreFixture {
    let fixture = StoreFixture::new();
    let main_x = fixture.source_file("main.x");

    let mut proto_def = occurrence(
        "s:P.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::DEFINITION | SymbolRoles::DYNAMIC,
        &main_x,
        2,
    );
    proto_def.relations = vec![relation(
        SymbolRoles::REL_CHILD_OF,
        "s:P",
        "P",
        SymbolKind::Protocol,
    )];

    let mut x_def = occurrence(
        "s:X.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::DEFINITION | SymbolRoles::DYNAMIC,
        &main_x,
        6,
    );
    x_def.relations = vec![
        relation(SymbolRoles::REL_CHILD_OF, "s:X", "X", SymbolKind::Class),
        relation(
            SymbolRoles::REL_OVERRIDE_OF,
            "s:P.m",
            "m",
            SymbolKind::InstanceMethod,
        ),
    ];

    let mut y_def = occurrence(
        "s:Y.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::DEFINITION | SymbolRoles::DYNAMIC,
        &main_x,
        10,
    );
    y_def.relations = vec![
        relation(SymbolRoles::REL_CHILD_OF, "s:Y", "Y", SymbolKind::Class),
        relation(
            SymbolRoles::REL_OVERRIDE_OF,
            "s:P.m",
            "m",
            SymbolKind::InstanceMethod,
        ),
    ];

    let proto_call = occurrence(
        "s:P.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::CALL | SymbolRoles::DYNAMIC,
        &main_x,
        30,
    );
    let x_call = occurrence(
        "s:X.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::CALL,
        &main_x,
        31,
    );
    let y_call = occurrence(
        "s:Y.m",
        "m",
        SymbolKind::InstanceMethod,
        SymbolRoles::CALL,
        &main_x,
        32,
    );

    fixture.write_unit(&unit(
        "main.o",
        "/build/main.o",
        vec![main_x],
        vec!["main.rec"],
    ));
    fixture.write_record(
        "main.rec",
        vec![proto_def, x_def, y_def, proto_call, x_call, y_call],
    );
    fixture
}

#[test]
fn protocol_method_expands_to_conforming_overrides() {
    let fixture = protocol_fixture();
    let index = fixture.index();

    let (completed, lines) = caller_lines(&index, "s:P.m");
    assert!(completed);
    assert_eq!(lines, vec![30, 31, 32]);
}

#[test]
fn non_callable_symbol_is_rejected_without_invoking_the_receiver() {
    let fixture = StoreFixture::new();
    let main_x = fixture.source_file("main.x");
    fixture.write_unit(&unit(
        "main.o",
        "/build/main.o",
        vec![main_x.clone()],
        vec!["main.rec"],
    ));
    fixture.write_record(
        "main.rec",
        vec![occurrence(
            "s:C",
            "C",
            SymbolKind::Class,
            SymbolRoles::DEFINITION,
            &main_x,
            1,
        )],
    );
    let index = fixture.index();

    let callee = canonical(&index, "s:C");
    let mut invoked = 0;
    let completed = index.foreach_symbol_call_occurrence(&callee, |_| {
        invoked += 1;
        true
    });
    assert!(!completed);
    assert_eq!(invoked, 0);
}

#[test]
fn receiver_abort_stops_the_expansion() {
    let fixture = protocol_fixture();
    let index = fixture.index();

    let callee = canonical(&index, "s:P.m");
    let mut invoked = 0;
    let completed = index.foreach_symbol_call_occurrence(&callee, |_| {
        invoked += 1;
        false
    });
    assert!(!completed);
    assert_eq!(invoked, 1);
}

#[test]
fn base_methods_and_classes_walk_transitively() {
    let fixture = class_hierarchy_fixture(Some("s:A"));
    let index = fixture.index();

    let method = canonical(&index, "s:B.m").symbol().clone();
    let bases: Vec<String> = index
        .get_base_methods_or_classes(&method)
        .iter()
        .map(|sym| sym.usr().as_str().to_owned())
        .collect();
    assert_eq!(bases, vec!["s:A.m".to_owned()]);

    // C's base walk reaches A through B.
    let c_class = {
        let mut found = None;
        index.foreach_related_symbol_occurrence_by_usr("s:C", SymbolRoles::REL_BASE_OF, |occ| {
            occ.foreach_related_symbol(SymbolRoles::REL_BASE_OF, |related| {
                found = Some(related.clone());
            });
            true
        });
        found.expect("class C")
    };
    let mut bases: Vec<String> = index
        .get_base_methods_or_classes(&c_class)
        .iter()
        .map(|sym| sym.usr().as_str().to_owned())
        .collect();
    bases.sort();
    assert_eq!(bases, vec!["s:A".to_owned(), "s:B".to_owned()]);
}
