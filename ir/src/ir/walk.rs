use super::context::{Context, Operation};

impl Context {
    /// Pre-order walk over `root` and every operation nested in its regions,
    /// in block order. Erased operations are skipped.
    pub fn walk_preorder(&self, root: Operation, f: &mut dyn FnMut(Operation)) {
        if self.is_op_erased(root) {
            return;
        }
        f(root);
        for &region in self.op_regions(root) {
            if self.region(region).erased {
                continue;
            }
            for &block in self.region_blocks(region) {
                if self.block(block).erased {
                    continue;
                }
                for &op in self.block_ops(block) {
                    self.walk_preorder(op, f);
                }
            }
        }
    }

    /// Collect the pre-order traversal into a vector of handles. The
    /// snapshot stays valid across rewrites because handles are stable;
    /// consumers skip entries that have been erased in the meantime.
    pub fn collect_preorder(&self, root: Operation) -> Vec<Operation> {
        let mut ops = Vec::new();
        self.walk_preorder(root, &mut |op| ops.push(op));
        ops
    }
}
