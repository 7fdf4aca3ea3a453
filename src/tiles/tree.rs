use crate::tiles::tile::{Tile, TileKey};

/// One quadtree node: a key, an optional resident tile, and either zero or
/// exactly four owned children. Children are materialized lazily on the
/// first insert that descends past this node, never partially.
#[derive(Debug)]
pub struct TileNode {
    pub key: TileKey,
    pub tile: Option<Tile>,
    children: Option<Box<[TileNode; 4]>>,
}

impl TileNode {
    fn new(key: TileKey) -> Self {
        Self {
            key,
            tile: None,
            children: None,
        }
    }

    pub fn children(&self) -> Option<&[TileNode; 4]> {
        self.children.as_deref()
    }

    /// Recursive insert. The tile travels in an `Option` slot: the one
    /// matching branch takes it, every other branch sees an empty slot and
    /// no-ops, mirroring the descent into all four children.
    fn add(&mut self, slot: &mut Option<Tile>) {
        let key = match slot.as_ref() {
            Some(tile) => tile.key,
            None => return,
        };

        if self.key.z == key.z {
            if self.key.x == key.x && self.key.y == key.y {
                // Re-insertion for the same key replaces the tile.
                self.tile = slot.take();
            }
            return;
        }

        if self.key.z < key.z {
            let shift = key.z - self.key.z;
            if (key.x >> shift) != self.key.x || (key.y >> shift) != self.key.y {
                // Wrong branch; the tile belongs to some other subtree.
                return;
            }
            if self.children.is_none() {
                let keys = self.key.children();
                self.children = Some(Box::new(keys.map(TileNode::new)));
            }
            if let Some(children) = self.children.as_mut() {
                for child in children.iter_mut() {
                    child.add(slot);
                }
            }
        }
    }

    fn get(&self, key: TileKey) -> Option<&TileNode> {
        if self.key.z == key.z {
            if self.key.x == key.x && self.key.y == key.y && self.tile.is_some() {
                return Some(self);
            }
            return None;
        }
        if self.key.z < key.z {
            if let Some(children) = &self.children {
                for child in children.iter() {
                    if let Some(found) = child.get(key) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    fn for_each_level<F: FnMut(Option<&Tile>)>(&self, z: u8, cb: &mut F) {
        if self.key.z == z {
            cb(self.tile.as_ref());
            return;
        }
        if self.key.z < z {
            if let Some(children) = &self.children {
                for child in children.iter() {
                    child.for_each_level(z, cb);
                }
            }
        }
    }

    fn count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flat_map(|c| c.iter())
            .map(TileNode::count)
            .sum::<usize>()
    }
}

/// The grow-only tile cache: a quadtree rooted at (0,0,0).
///
/// Tiles are added and never evicted, so memory grows with every distinct
/// key ever fetched. The node count is logged at debug level so the growth
/// is at least observable.
#[derive(Debug)]
pub struct TileTree {
    root: TileNode,
}

impl TileTree {
    pub fn new() -> Self {
        Self {
            root: TileNode::new(TileKey::new(0, 0, 0)),
        }
    }

    pub fn root(&self) -> &TileNode {
        &self.root
    }

    /// Insert a fetched tile at its key. Inserts whose ancestor path does
    /// not reach the root quadrant are silently dropped.
    pub fn add_tile(&mut self, tile: Tile) {
        let key = tile.key;
        let mut slot = Some(tile);
        self.root.add(&mut slot);
        log::debug!(
            "tile tree: added {:?}, {} nodes resident",
            key,
            self.root.count()
        );
    }

    /// The node holding a tile at (z,x,y), or `None` if no populated node
    /// exists there.
    pub fn get_tile_node(&self, z: u8, x: u32, y: u32) -> Option<&TileNode> {
        self.root.get(TileKey::new(z, x, y))
    }

    /// Visit every committed node at exactly level `z`. The callback
    /// receives `None` for quadrants whose node exists but holds no tile;
    /// callers read the none/some ratio as a loading-progress signal.
    /// Branches never descended into are not synthesized.
    pub fn for_each_tiles_of_level<F: FnMut(Option<&Tile>)>(&self, z: u8, mut cb: F) {
        self.root.for_each_level(z, &mut cb);
    }

    /// Number of resident tiles at exactly level `z`.
    pub fn ready_count_at_level(&self, z: u8) -> (usize, usize) {
        let mut ready = 0;
        let mut total = 0;
        self.for_each_tiles_of_level(z, |tile| {
            total += 1;
            if tile.is_some() {
                ready += 1;
            }
        });
        (ready, total)
    }
}

impl Default for TileTree {
    fn default() -> Self {
        Self::new()
    }
}
