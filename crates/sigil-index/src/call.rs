//! Call-site expansion: given a callee occurrence, enumerate every occurrence
//! that could invoke it, including indirect invocation via dynamic dispatch,
//! protocol conformance and class extensions.

use std::collections::{HashSet, VecDeque};

use sigil_core::{SymbolKind, SymbolOccurrence, SymbolOccurrenceRef, SymbolRef, SymbolRoles, Usr};

use crate::symbol_index::SymbolIndex;

fn contains_sym_with_usr(sym: &SymbolRef, syms: &[SymbolRef]) -> bool {
    syms.iter().any(|candidate| candidate.usr() == sym.usr())
}

/// Walk the base hierarchy of `root`, appending each newly discovered symbol
/// to `out`.
///
/// For an instance method this follows override-of relations on its own
/// occurrences (the methods it overrides); for anything else it follows
/// base-of relations (the types it inherits from). Deduplicated by USR
/// against what `out` already holds; `root` itself is not appended.
pub(crate) fn collect_base_methods_or_classes(
    index: &SymbolIndex,
    root: &SymbolRef,
    out: &mut Vec<SymbolRef>,
) {
    let mut seen: HashSet<Usr> = out.iter().map(|sym| sym.usr().clone()).collect();
    let mut queue: VecDeque<SymbolRef> = VecDeque::from([root.clone()]);

    while let Some(sym) = queue.pop_front() {
        let mut discovered: Vec<SymbolRef> = Vec::new();
        if sym.kind() == SymbolKind::InstanceMethod {
            index.foreach_symbol_occurrence_by_usr(
                sym.usr(),
                SymbolRoles::REL_OVERRIDE_OF,
                |occurrence| {
                    occurrence.foreach_related_symbol(SymbolRoles::REL_OVERRIDE_OF, |related| {
                        discovered.push(related.clone());
                    });
                    true
                },
            );
        } else {
            index.foreach_related_symbol_occurrence_by_usr(
                sym.usr(),
                SymbolRoles::REL_BASE_OF,
                |occurrence| {
                    discovered.push(occurrence.symbol().clone());
                    true
                },
            );
        }
        for related in discovered {
            if seen.insert(related.usr().clone()) {
                out.push(related.clone());
                queue.push_back(related);
            }
        }
    }
}

/// Transitively collect occurrences related to `root` under `role_set`,
/// deduplicated by the occurring symbol's USR.
///
/// Used with `REL_OVERRIDE_OF` to find every method conforming to (or
/// overriding) a protocol requirement.
fn collect_all_related_occurrences(
    index: &SymbolIndex,
    root: &SymbolRef,
    role_set: SymbolRoles,
    out: &mut Vec<SymbolOccurrenceRef>,
) {
    let mut seen: HashSet<Usr> = HashSet::new();
    let mut queue: VecDeque<SymbolRef> = VecDeque::from([root.clone()]);

    while let Some(sym) = queue.pop_front() {
        let mut discovered: Vec<SymbolOccurrenceRef> = Vec::new();
        index.foreach_related_symbol_occurrence_by_usr(sym.usr(), role_set, |occurrence| {
            discovered.push(occurrence.clone());
            true
        });
        for occurrence in discovered {
            if seen.insert(occurrence.symbol().usr().clone()) {
                queue.push_back(occurrence.symbol().clone());
                out.push(occurrence);
            }
        }
    }
}

/// See the module docs. Returns `false` when the callee is not callable or
/// when the receiver aborted the enumeration.
pub(crate) fn foreach_symbol_call_occurrence(
    index: &SymbolIndex,
    callee: &SymbolOccurrence,
    receiver: &mut dyn FnMut(&SymbolOccurrenceRef) -> bool,
) -> bool {
    let sym = callee.symbol();
    if !sym.is_callable() {
        return false;
    }

    // Direct call references.
    if !index.foreach_symbol_occurrence_by_usr(sym.usr(), SymbolRoles::CALL, &mut *receiver) {
        return false;
    }

    if !callee.roles().contains_any(SymbolRoles::DYNAMIC) {
        // No need to search for dynamic callers.
        return true;
    }

    // Collect the receiver classes. A dynamic call whose receiver sits in the
    // callee's base hierarchy is a potential caller.
    let relation_to_use = if callee.roles().contains_any(SymbolRoles::CALL) {
        SymbolRoles::REL_RECEIVED_BY
    } else {
        SymbolRoles::REL_CHILD_OF
    };
    let mut cls_syms: Vec<SymbolRef> = Vec::new();
    callee.foreach_related_symbol(relation_to_use, |related| {
        cls_syms.push(related.clone());
    });

    // Replace extensions with the types they extend.
    for cls_sym in &mut cls_syms {
        if cls_sym.kind() == SymbolKind::Extension {
            let usr = cls_sym.usr().to_owned();
            index.foreach_related_symbol_occurrence_by_usr(
                &usr,
                SymbolRoles::REL_EXTENDED_BY,
                |occurrence| {
                    *cls_sym = occurrence.symbol().clone();
                    false
                },
            );
        }
    }

    if cls_syms.is_empty() {
        return true;
    }

    if cls_syms[0].kind() == SymbolKind::Protocol {
        // Direct call references of all the conforming methods.
        let mut override_occurrences: Vec<SymbolOccurrenceRef> = Vec::new();
        collect_all_related_occurrences(
            index,
            sym,
            SymbolRoles::REL_OVERRIDE_OF,
            &mut override_occurrences,
        );
        for occurrence in &override_occurrences {
            if !index.foreach_symbol_occurrence_by_usr(
                occurrence.symbol().usr(),
                SymbolRoles::CALL,
                &mut *receiver,
            ) {
                return false;
            }
        }
        return true;
    }

    let mut class_syms: Vec<SymbolRef> = Vec::new();
    for cls_sym in &cls_syms {
        collect_base_methods_or_classes(index, cls_sym, &mut class_syms);
        class_syms.push(cls_sym.clone());
    }

    // All override methods walking the base hierarchy.
    let mut base_method_syms: Vec<SymbolRef> = Vec::new();
    collect_base_methods_or_classes(index, sym, &mut base_method_syms);

    for method_sym in &base_method_syms {
        let keep_going = index.foreach_symbol_occurrence_by_usr(
            method_sym.usr(),
            SymbolRoles::CALL,
            |occurrence| {
                if !occurrence.roles().contains_any(SymbolRoles::DYNAMIC) {
                    return true;
                }

                let mut possibly_called_via_dispatch = false;
                if !occurrence
                    .roles()
                    .contains_any(SymbolRoles::REL_RECEIVED_BY)
                {
                    // Receiver is statically unknown, so the class the method
                    // belongs to is a candidate.
                    possibly_called_via_dispatch = true;
                } else {
                    occurrence.foreach_related_symbol(SymbolRoles::REL_RECEIVED_BY, |related| {
                        if contains_sym_with_usr(related, &class_syms) {
                            possibly_called_via_dispatch = true;
                        }
                    });
                }
                if possibly_called_via_dispatch {
                    return receiver(occurrence);
                }
                true
            },
        );
        if !keep_going {
            return false;
        }
    }

    true
}
