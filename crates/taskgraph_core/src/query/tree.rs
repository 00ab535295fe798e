//! Flat rows to parent/child trees.

use crate::model::task::{Task, TaskId};
use crate::model::view::TaskView;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Row that knows its own id and parent id.
pub trait HierarchyItem {
    fn item_id(&self) -> TaskId;
    fn item_parent_id(&self) -> Option<TaskId>;
}

impl HierarchyItem for Task {
    fn item_id(&self) -> TaskId {
        self.id
    }

    fn item_parent_id(&self) -> Option<TaskId> {
        self.parent_id
    }
}

impl HierarchyItem for TaskView {
    fn item_id(&self) -> TaskId {
        self.id
    }

    fn item_parent_id(&self) -> Option<TaskId> {
        self.parent_id
    }
}

/// One tree node; serializes as the item's fields plus `children`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Builds a forest from flat items, keeping input order among siblings.
///
/// Items whose parent is absent from `items` become roots. Items caught in
/// a parent cycle are surfaced as roots too; no item is dropped or
/// duplicated, and the build never recurses.
pub fn build_hierarchy<T: HierarchyItem>(items: Vec<T>) -> Vec<TreeNode<T>> {
    let index_by_id: HashMap<TaskId, usize> = items
        .iter()
        .enumerate()
        .map(|(index, item)| (item.item_id(), index))
        .collect();

    let parent_index: Vec<Option<usize>> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.item_parent_id()
                .and_then(|parent_id| index_by_id.get(&parent_id).copied())
                .filter(|parent| *parent != index)
        })
        .collect();

    let cyclic = cyclic_indices(&parent_index);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut roots = Vec::new();
    for (index, parent) in parent_index.iter().enumerate() {
        match parent {
            Some(parent) if !cyclic.contains(&index) => children[*parent].push(index),
            _ => roots.push(index),
        }
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|root| assemble(root, &children, &mut slots))
        .collect()
}

/// Marks every index that sits on a parent cycle.
fn cyclic_indices(parent_index: &[Option<usize>]) -> HashSet<usize> {
    // 0 = unvisited, 1 = on current walk, 2 = done
    let mut state = vec![0u8; parent_index.len()];
    let mut cyclic = HashSet::new();
    for start in 0..parent_index.len() {
        let mut path = Vec::new();
        let mut cursor = Some(start);
        while let Some(current) = cursor {
            match state[current] {
                2 => break,
                1 => {
                    if let Some(position) = path.iter().position(|index| *index == current) {
                        cyclic.extend(path[position..].iter().copied());
                    }
                    break;
                }
                _ => {
                    state[current] = 1;
                    path.push(current);
                    cursor = parent_index[current];
                }
            }
        }
        for index in path {
            state[index] = 2;
        }
    }
    cyclic
}

/// Post-order assembly with an explicit stack.
fn assemble<T>(
    root: usize,
    children: &[Vec<usize>],
    slots: &mut [Option<T>],
) -> Option<TreeNode<T>> {
    let mut built: HashMap<usize, TreeNode<T>> = HashMap::new();
    let mut stack = vec![(root, false)];
    while let Some((index, expanded)) = stack.pop() {
        if expanded {
            let item = slots[index].take()?;
            let node_children = children[index]
                .iter()
                .filter_map(|child| built.remove(child))
                .collect();
            built.insert(
                index,
                TreeNode {
                    item,
                    children: node_children,
                },
            );
        } else {
            stack.push((index, true));
            for child in children[index].iter().rev() {
                stack.push((*child, false));
            }
        }
    }
    built.remove(&root)
}
