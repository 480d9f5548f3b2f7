use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardMutation};
use crate::types::{ApplicationId, Stage};

/// End of a drag gesture: the dragged card and where it was released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragEnd {
    pub active: ApplicationId,
    #[serde(default)]
    pub over: Option<DropTarget>,
}

/// Element a card was dropped on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DropTarget {
    Item { id: ApplicationId },
    Column { stage: Stage },
}

/// Resolves a drag gesture into the mutation it implies, if any.
///
/// Dropping within the source column reorders it with array-move semantics;
/// dropping on another column, or on a card in another column, moves the card
/// to the end of that column. Dropping on the card's own column sends it to
/// the end of the column.
pub fn resolve_drag(board: &Board, drag: &DragEnd) -> Option<BoardMutation> {
    let over = drag.over.as_ref()?;
    if matches!(over, DropTarget::Item { id } if *id == drag.active) {
        return None;
    }

    let source = board.stage_of(&drag.active)?;
    let target = match over {
        DropTarget::Column { stage } => *stage,
        DropTarget::Item { id } => board.stage_of(id)?,
    };

    if source != target {
        return Some(BoardMutation::Move {
            id: drag.active.clone(),
            from: source,
            to: target,
        });
    }

    let items = board.column(source);
    let from = items.iter().position(|id| *id == drag.active)?;
    let to = match over {
        DropTarget::Item { id } => items.iter().position(|candidate| candidate == id)?,
        DropTarget::Column { .. } => items.len() - 1,
    };
    if from == to {
        return None;
    }

    Some(BoardMutation::Reorder {
        stage: source,
        order: array_move(items, from, to),
    })
}

/// Returns a copy of `items` with the element at `from` relocated to `to`.
///
/// The element is removed first, so `to` addresses the shortened list; an
/// out-of-range `to` appends. An out-of-range `from` returns the input unchanged.
pub fn array_move<T: Clone>(items: &[T], from: usize, to: usize) -> Vec<T> {
    let mut moved = items.to_vec();
    if from >= moved.len() {
        return moved;
    }
    let item = moved.remove(from);
    let to = to.min(moved.len());
    moved.insert(to, item);
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{application, ids};

    fn board() -> Board {
        Board::from_applications(vec![
            application("a", Stage::Applied),
            application("b", Stage::Applied),
            application("c", Stage::Applied),
            application("x", Stage::Offer),
        ])
    }

    fn drag(active: &str, over: Option<DropTarget>) -> DragEnd {
        DragEnd {
            active: active.into(),
            over,
        }
    }

    fn item(id: &str) -> Option<DropTarget> {
        Some(DropTarget::Item { id: id.into() })
    }

    #[test]
    fn array_move_shifts_neighbours() {
        assert_eq!(array_move(&["a", "b", "c"], 2, 0), vec!["c", "a", "b"]);
        assert_eq!(array_move(&["a", "b", "c"], 0, 2), vec!["b", "c", "a"]);
        assert_eq!(array_move(&["a", "b", "c"], 1, 1), vec!["a", "b", "c"]);
        assert_eq!(array_move(&["a", "b"], 5, 0), vec!["a", "b"]);
    }

    #[test]
    fn dragging_last_card_onto_first_reorders() {
        let board = board();
        let mutation = resolve_drag(&board, &drag("c", item("a"))).expect("mutation");
        assert_eq!(
            mutation,
            BoardMutation::Reorder {
                stage: Stage::Applied,
                order: ids(&["c", "a", "b"]),
            }
        );
    }

    #[test]
    fn missing_target_or_self_drop_is_ignored() {
        let board = board();
        assert!(resolve_drag(&board, &drag("a", None)).is_none());
        assert!(resolve_drag(&board, &drag("a", item("a"))).is_none());
    }

    #[test]
    fn unknown_cards_are_ignored() {
        let board = board();
        assert!(resolve_drag(&board, &drag("ghost", item("a"))).is_none());
        assert!(resolve_drag(&board, &drag("a", item("ghost"))).is_none());
    }

    #[test]
    fn dropping_on_other_column_moves() {
        let board = board();
        let mutation = resolve_drag(
            &board,
            &drag(
                "b",
                Some(DropTarget::Column {
                    stage: Stage::Rejected,
                }),
            ),
        )
        .expect("mutation");
        assert_eq!(
            mutation,
            BoardMutation::Move {
                id: "b".into(),
                from: Stage::Applied,
                to: Stage::Rejected,
            }
        );
    }

    #[test]
    fn dropping_on_card_in_other_column_moves_to_its_column() {
        let board = board();
        let mutation = resolve_drag(&board, &drag("a", item("x"))).expect("mutation");
        assert!(matches!(
            mutation,
            BoardMutation::Move {
                from: Stage::Applied,
                to: Stage::Offer,
                ..
            }
        ));
    }

    #[test]
    fn dropping_on_own_column_sends_card_to_end() {
        let board = board();
        let mutation = resolve_drag(
            &board,
            &drag(
                "a",
                Some(DropTarget::Column {
                    stage: Stage::Applied,
                }),
            ),
        )
        .expect("mutation");
        assert_eq!(
            mutation,
            BoardMutation::Reorder {
                stage: Stage::Applied,
                order: ids(&["b", "c", "a"]),
            }
        );

        assert!(resolve_drag(
            &board,
            &drag(
                "c",
                Some(DropTarget::Column {
                    stage: Stage::Applied
                })
            )
        )
        .is_none());
    }

    #[test]
    fn drag_payload_deserializes_from_ui_json() {
        let drag: DragEnd = serde_json::from_value(serde_json::json!({
            "active": "3",
            "over": { "type": "column", "stage": "Offer" }
        }))
        .unwrap();
        assert_eq!(
            drag.over,
            Some(DropTarget::Column {
                stage: Stage::Offer
            })
        );

        let drag: DragEnd = serde_json::from_value(serde_json::json!({ "active": "3" })).unwrap();
        assert!(drag.over.is_none());
    }
}
