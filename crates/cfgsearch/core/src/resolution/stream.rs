// CfgSearch
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use super::{PruneRecord, ResolutionResult, Resolver, SearchNode};
use tracing::debug;

/// Lazy depth-first enumeration of the nodes realising an interface
///
/// Nodes are produced in pre-order and only expanded when the consumer asks
/// for the next one. Branches dropped along the way are kept in
/// [`ResolutionStream::pruned`].
#[derive(Debug)]
pub struct ResolutionStream {
    resolver: Resolver,
    stack: Vec<SearchNode>,
    pruned: Vec<PruneRecord>,
    terminal_only: bool,
}

impl ResolutionStream {
    pub fn new(resolver: Resolver, interface: &str) -> ResolutionResult<Self> {
        let roots = resolver.roots(interface)?;
        let mut stack = roots.children;
        stack.reverse();
        Ok(Self {
            resolver,
            stack,
            pruned: roots.pruned,
            terminal_only: false,
        })
    }

    /// Restricts the stream to terminal nodes
    pub fn terminals(mut self) -> Self {
        self.terminal_only = true;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Branches pruned so far
    pub fn pruned(&self) -> &[PruneRecord] {
        &self.pruned
    }
}

impl Iterator for ResolutionStream {
    type Item = SearchNode;

    fn next(&mut self) -> Option<SearchNode> {
        while let Some(node) = self.stack.pop() {
            let terminal = node.is_terminal();
            if !terminal {
                let expansion = self.resolver.successors(&node);
                self.pruned.extend(expansion.pruned);
                self.stack.extend(expansion.children.into_iter().rev());
            }
            if terminal || !self.terminal_only {
                return Some(node);
            }
        }
        debug!(pruned = self.pruned.len(), "Resolution stream exhausted");
        None
    }
}
