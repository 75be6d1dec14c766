//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use super::graph::{EdgeStatus, Graph, NodeIndex};
use std::{collections::HashMap, hash::Hash};

/// A [Graph] whose nodes are looked up by a unique key.
///
/// The graph itself stores the keys; the values live in the map alongside
/// the index of their node.
pub struct GraphMap<K: Eq + Hash + Clone, V, E> {
    graph: Graph<K, E>,
    map: HashMap<K, Node<V>>,
}

#[derive(Debug, PartialEq)]
pub struct Node<V>(V, NodeIndex);

impl<V> Node<V> {
    pub fn index(&self) -> NodeIndex {
        self.1
    }

    pub fn as_ref(&self) -> &V {
        &self.0
    }

    pub fn as_ref_mut(&mut self) -> &mut V {
        &mut self.0
    }
}

impl<K: Eq + Hash + Clone, V, E> GraphMap<K, V, E> {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            map: HashMap::new(),
        }
    }

    /// Inserts a node under `key`, returning its index.
    ///
    /// If the key already exists, its value is left untouched and the existing
    /// index is returned.
    pub fn add_node(&mut self, key: K, value: V) -> NodeIndex {
        if let Some(node) = self.map.get(&key) {
            return node.index();
        }
        let iden = self.graph.add_node(key.clone());
        self.map.insert(key, Node(value, iden));
        iden
    }

    pub fn add_edge_by_key(&mut self, source: &K, target: &K, cost: E) -> EdgeStatus {
        let source = match self.map.get(source) {
            Some(i) => i.index(),
            None => return EdgeStatus::MissingSource,
        };
        let target = match self.map.get(target) {
            Some(i) => i.index(),
            None => return EdgeStatus::MissingTarget,
        };
        self.graph.add_edge(source, target, cost)
    }

    pub fn get_node_by_key(&self, key: &K) -> Option<&Node<V>> {
        self.map.get(key)
    }

    pub fn get_node_by_key_mut(&mut self, key: &K) -> Option<&mut Node<V>> {
        self.map.get_mut(key)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn get_graph(&self) -> &Graph<K, E> {
        &self.graph
    }
}
