use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::Block;

/// Blocks reachable from the roots, in breadth-first order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredBlocks {
    pub blocks: Vec<Block>,
    /// Blocks whose parent chain never reached a root.
    pub dropped: usize,
}

/// Rebuilds the forest rooted at the blocks without a parent. Blocks whose
/// ancestry is broken are left out.
pub fn filter_orphans(blocks: Vec<Block>) -> FilteredBlocks {
    walk(blocks, |block| block.parent_id.is_none())
}

/// Board exports also treat blocks parented to the board itself as roots.
pub fn filter_orphans_of_board(blocks: Vec<Block>, board_id: &str) -> FilteredBlocks {
    walk(blocks, |block| block.parent_id.is_none() || block.parent_str() == board_id)
}

/// Same walk, seeded with the block whose id is `root_id`.
pub fn filter_orphans_from(blocks: Vec<Block>, root_id: &str) -> FilteredBlocks {
    walk(blocks, |block| block.id.as_str() == root_id)
}

fn walk(blocks: Vec<Block>, is_root: impl Fn(&Block) -> bool) -> FilteredBlocks {
    let total = blocks.len();
    let mut queue = VecDeque::new();
    let mut children: HashMap<String, Vec<Block>> = HashMap::new();

    for block in blocks {
        if is_root(&block) {
            queue.push_back(block);
        } else {
            children.entry(block.parent_str().to_string()).or_default().push(block);
        }
    }

    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(total);
    while let Some(block) = queue.pop_front() {
        if !seen.insert(block.id.as_str().to_string()) {
            continue;
        }
        if let Some(kids) = children.remove(block.id.as_str()) {
            queue.extend(kids);
        }
        result.push(block);
    }

    FilteredBlocks {
        dropped: total - result.len(),
        blocks: result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;

    fn block(id: &str, parent: &str) -> Block {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "boardId": "b1",
            "parentId": parent,
            "type": "text",
            "createAt": 1,
            "updateAt": 1
        }))
        .unwrap()
    }

    fn ids(filtered: &FilteredBlocks) -> Vec<&str> {
        filtered.blocks.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_drops_blocks_with_missing_ancestor() {
        let filtered = filter_orphans(vec![block("A", ""), block("B", "A"), block("C", "Z")]);
        assert_eq!(ids(&filtered), vec!["A", "B"]);
        assert_eq!(filtered.dropped, 1);
    }

    #[test]
    fn test_breadth_first_order() {
        let filtered = filter_orphans(vec![
            block("A1", "A"),
            block("A", ""),
            block("B", ""),
            block("A1x", "A1"),
            block("B1", "B"),
            block("A2", "A"),
        ]);
        assert_eq!(ids(&filtered), vec!["A", "B", "A1", "A2", "B1", "A1x"]);
        assert_eq!(filtered.dropped, 0);
    }

    #[test]
    fn test_empty_and_all_roots() {
        assert_eq!(filter_orphans(Vec::new()), FilteredBlocks::default());

        let roots = vec![block("x", ""), block("y", ""), block("z", "")];
        let filtered = filter_orphans(roots.clone());
        assert_eq!(filtered.blocks, roots);
    }

    #[test]
    fn test_idempotent() {
        let once = filter_orphans(vec![block("A", ""), block("C", "Z"), block("B", "A"), block("D", "C")]);
        let twice = filter_orphans(once.blocks.clone());
        assert_eq!(once.blocks, twice.blocks);
        assert_eq!(once.dropped, 2);
        assert_eq!(twice.dropped, 0);
    }

    #[test]
    fn test_cycle_never_reached() {
        let filtered = filter_orphans(vec![block("A", "B"), block("B", "A"), block("R", "")]);
        assert_eq!(ids(&filtered), vec!["R"]);
        assert_eq!(filtered.dropped, 2);
    }

    #[test]
    fn test_duplicate_ids_emitted_once() {
        let filtered = filter_orphans(vec![block("A", ""), block("A", "")]);
        assert_eq!(ids(&filtered), vec!["A"]);
        assert_eq!(filtered.dropped, 1);
    }

    #[test]
    fn test_board_parented_blocks_are_roots() {
        let filtered = filter_orphans_of_board(
            vec![block("view", "b1"), block("card", ""), block("text", "card"), block("lost", "b2")],
            "b1",
        );
        assert_eq!(ids(&filtered), vec!["view", "card", "text"]);
        assert_eq!(filtered.dropped, 1);
    }

    #[test]
    fn test_seeded_from_root_block() {
        let mut card = block("card", "board");
        card.board_id = EntityId::assigned("board");
        let filtered = filter_orphans_from(
            vec![block("t1", "card"), card, block("t2", "t1"), block("stray", "nope")],
            "card",
        );
        assert_eq!(ids(&filtered), vec!["card", "t1", "t2"]);
        assert_eq!(filtered.dropped, 1);
    }
}
