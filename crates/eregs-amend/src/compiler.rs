//! Apply a change map to produce the next version of a regulation.
//!
//! Changes run in phases: deletions and reservations, then moves, then
//! replacements, then additions. Within a phase they run in label order,
//! so parents are added before their children. Moves run as one batch:
//! every source is detached before any lands, so a chain of
//! redesignations (b to c, c to d) never clobbers a paragraph still
//! waiting to move.

use std::collections::BTreeSet;

use eregs_core::Node;
use eregs_parse::{Action, ChangeMap, ChangeRecord};
use tracing::{debug, warn};

use crate::labels::find_candidate;
use crate::tree::RegulationTree;

fn split(label_id: &str) -> Vec<String> {
    label_id.split('-').map(str::to_string).collect()
}

/// The tree `prior` becomes once `changes` are applied. `prior` is left
/// untouched; the same inputs always give the same output.
pub fn compile(prior: &Node, changes: &ChangeMap) -> Node {
    let mut tree = RegulationTree::new(prior.clone());

    let mut ordered: Vec<(Vec<String>, &ChangeRecord)> = changes
        .iter()
        .flat_map(|(label, records)| records.iter().map(move |r| (split(label), r)))
        .collect();
    ordered.sort_by_key(|(_, record)| record.action.phase());

    let (moves, rest): (Vec<_>, Vec<_>) = ordered
        .into_iter()
        .partition(|(_, record)| record.action == Action::Move);
    let phase = Action::Move.phase();
    for (label, record) in rest.iter().filter(|(_, r)| r.action.phase() < phase) {
        apply(&mut tree, label, record);
    }
    apply_moves(&mut tree, &moves);
    for (label, record) in rest.iter().filter(|(_, r)| r.action.phase() > phase) {
        apply(&mut tree, label, record);
    }
    tree.into_node()
}

/// Relabel a misplaced candidate into `label`. False when no candidate is
/// left to relabel.
fn resolve_candidate(tree: &mut RegulationTree, label: &[String], record: &ChangeRecord) -> bool {
    if !record.candidate || tree.contains(label) {
        return true;
    }
    let label_id = label.join("-");
    match find_candidate(tree.root(), label) {
        Some(found) => {
            debug!(label = %label_id, from = %found.join("-"), "relabelling candidate");
            tree.move_to(&found, label);
            true
        }
        None => {
            warn!(label = %label_id, "candidate vanished before it could be applied");
            false
        }
    }
}

fn apply_moves(tree: &mut RegulationTree, moves: &[(Vec<String>, &ChangeRecord)]) {
    let mut pending: Vec<(&[String], &[String])> = Vec::with_capacity(moves.len());
    for (label, record) in moves {
        if !resolve_candidate(tree, label, record) {
            continue;
        }
        match &record.destination {
            Some(destination) => pending.push((label.as_slice(), destination.as_slice())),
            None => warn!(label = %label.join("-"), "move has no destination"),
        }
    }

    // A destination must be vacant or itself moving away. Refusing one
    // move can pin its source in place, so repeat until nothing changes.
    loop {
        let leaving: BTreeSet<&[String]> = pending.iter().map(|(from, _)| *from).collect();
        let before = pending.len();
        pending.retain(|(from, to)| {
            let clear = !tree.destination_taken(to) || leaving.contains(to);
            if !clear {
                warn!(
                    label = %from.join("-"),
                    destination = %to.join("-"),
                    "move destination is occupied, leaving node in place"
                );
            }
            clear
        });
        if pending.len() == before {
            break;
        }
    }

    let mut detached = Vec::with_capacity(pending.len());
    for (from, to) in pending {
        match tree.detach_for_move(from, to) {
            Some(node) => detached.push((node, to)),
            None => warn!(label = %from.join("-"), "moved node is missing"),
        }
    }
    for (node, to) in detached {
        if !tree.place_moved(node, to) {
            warn!(destination = %to.join("-"), "moved node could not be placed");
        }
    }
}

fn apply(tree: &mut RegulationTree, label: &[String], record: &ChangeRecord) {
    let label_id = label.join("-");
    if !resolve_candidate(tree, label, record) {
        return;
    }

    let applied = match record.action {
        Action::Delete => tree.delete(label).is_some(),
        Action::Reserve => tree.reserve(label),
        Action::Move => match &record.destination {
            Some(destination) => tree.move_to(label, destination),
            None => false,
        },
        Action::Put => match &record.node {
            Some(node) => tree.replace(label, node.clone(), record.field),
            None => false,
        },
        Action::Post => match &record.node {
            Some(node) => tree.add(node.clone()),
            None => false,
        },
        Action::Keep => true,
    };
    if !applied {
        warn!(label = %label_id, action = ?record.action, "change could not be applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eregs_parse::Field;
    use pretty_assertions::assert_eq;

    fn label(id: &str) -> Vec<String> {
        split(id)
    }

    fn prior() -> Node {
        Node::regtext("", &["1005"]).with_children(vec![
            Node::regtext("", &["1005", "7"])
                .with_title("§ 1005.7 Scope.")
                .with_children(vec![
                    Node::regtext("(a) A.", &["1005", "7", "a"]),
                    Node::regtext("(b) B.", &["1005", "7", "b"]).with_children(vec![
                        Node::regtext("(1) One.", &["1005", "7", "b", "1"]),
                        Node::regtext("(2) Two.", &["1005", "7", "b", "2"]),
                    ]),
                    Node::regtext("(c) C.", &["1005", "7", "c"]),
                ]),
        ])
    }

    fn changes(entries: Vec<(&str, ChangeRecord)>) -> ChangeMap {
        let mut map = ChangeMap::new();
        for (id, record) in entries {
            map.entry(id.to_string()).or_default().push(record);
        }
        map
    }

    #[test]
    fn put_replaces_one_subtree() {
        let before = prior();
        let new = Node::regtext("(2) Revised.", &["1005", "7", "b", "2"]);
        let after = compile(
            &before,
            &changes(vec![(
                "1005-7-b-2",
                ChangeRecord::new(Action::Put).with_node(new.clone()),
            )]),
        );

        let mut expected = before.clone();
        *expected.find_mut("1005-7-b-2").unwrap() = new;
        assert_eq!(after, expected);
        assert_eq!(before, prior());
    }

    #[test]
    fn phases_run_in_order() {
        let mut moved = ChangeRecord::new(Action::Move);
        moved.destination = Some(label("1005-7-d"));
        let after = compile(
            &prior(),
            &changes(vec![
                (
                    "1005-7-c",
                    ChangeRecord::new(Action::Post)
                        .with_node(Node::regtext("(c) New C.", &["1005", "7", "c"])),
                ),
                ("1005-7-c", moved),
                ("1005-7-a", ChangeRecord::new(Action::Delete)),
            ]),
        );
        let section = after.find("1005-7").unwrap();
        assert_eq!(
            section.child_labels(),
            vec!["1005-7-b", "1005-7-c", "1005-7-d"]
        );
        assert_eq!(after.find("1005-7-c").unwrap().text, "(c) New C.");
        assert_eq!(after.find("1005-7-d").unwrap().text, "(d) C.");
    }

    fn moved(to: &str) -> ChangeRecord {
        let mut record = ChangeRecord::new(Action::Move);
        record.destination = Some(label(to));
        record
    }

    #[test]
    fn chained_redesignations_keep_every_paragraph() {
        let after = compile(
            &prior(),
            &changes(vec![("1005-7-b", moved("1005-7-c")), ("1005-7-c", moved("1005-7-d"))]),
        );
        let section = after.find("1005-7").unwrap();
        let paragraphs: Vec<(String, &str)> = section
            .children
            .iter()
            .map(|c| (c.label_id(), c.text.as_str()))
            .collect();
        assert_eq!(
            paragraphs,
            vec![
                ("1005-7-a".to_string(), "(a) A."),
                ("1005-7-c".to_string(), "(c) B."),
                ("1005-7-d".to_string(), "(d) C."),
            ]
        );
        assert_eq!(
            after.find("1005-7-c").unwrap().child_labels(),
            vec!["1005-7-c-1", "1005-7-c-2"]
        );
    }

    #[test]
    fn move_onto_a_standing_paragraph_is_refused() {
        let after = compile(&prior(), &changes(vec![("1005-7-a", moved("1005-7-c"))]));
        let section = after.find("1005-7").unwrap();
        assert_eq!(
            section.child_labels(),
            vec!["1005-7-a", "1005-7-b", "1005-7-c"]
        );
        assert_eq!(after.find("1005-7-a").unwrap().text, "(a) A.");
        assert_eq!(after.find("1005-7-c").unwrap().text, "(c) C.");
    }

    #[test]
    fn refused_move_keeps_its_source_occupied() {
        // c cannot move onto a, so b cannot move onto c either.
        let after = compile(
            &prior(),
            &changes(vec![("1005-7-b", moved("1005-7-c")), ("1005-7-c", moved("1005-7-a"))]),
        );
        assert_eq!(after, prior());
    }

    #[test]
    fn heading_only_put() {
        let mut record = ChangeRecord::new(Action::Put)
            .with_node(Node::regtext("ignored", &["1005", "7"]).with_title("§ 1005.7 Coverage."));
        record.field = Some(Field::Heading);
        let after = compile(&prior(), &changes(vec![("1005-7", record)]));
        let section = after.find("1005-7").unwrap();
        assert_eq!(section.title.as_deref(), Some("§ 1005.7 Coverage."));
        assert_eq!(section.children.len(), 3);
    }

    #[test]
    fn candidate_is_relabelled_then_revised() {
        let mut record = ChangeRecord::new(Action::Put)
            .with_node(Node::regtext("(3) Fixed.", &["1005", "7", "c", "3"]));
        record.candidate = true;
        let mut before = prior();
        before
            .find_mut("1005-7")
            .unwrap()
            .children
            .push(Node::regtext("(3) Misplaced.", &["1005", "7", "3"]));

        let after = compile(&before, &changes(vec![("1005-7-c-3", record)]));
        assert!(after.find("1005-7-3").is_none());
        assert_eq!(after.find("1005-7-c-3").unwrap().text, "(3) Fixed.");
    }

    #[test]
    fn same_inputs_same_json() {
        let map = changes(vec![("1005-7-a", ChangeRecord::new(Action::Reserve))]);
        let a = compile(&prior(), &map).to_json().unwrap();
        let b = compile(&prior(), &map).to_json().unwrap();
        assert_eq!(a, b);
        assert!(a.contains("(a) [Reserved]"));
    }
}
