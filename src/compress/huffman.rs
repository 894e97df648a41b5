//! Huffman coding for DEFLATE blocks (RFC 1951 section 3.2).
//!
//! [`HuffmanCoder`] tallies the literal/length/distance tokens of one block,
//! builds length-limited canonical codes for them, picks the cheapest of the
//! stored, static, and dynamic encodings, and writes the block into its
//! [`PendingBuffer`].

use crate::bits::PendingBuffer;
use crate::compress::config::{MAX_BLOCK_SIZE, TALLY_BUF_SIZE};
use crate::error::{Error, Result};

/// Literal/length alphabet size (0-255 literals, 256 end of block, 257-285 lengths).
pub const LITERAL_NUM: usize = 286;
/// Distance alphabet size.
pub const DISTANCE_NUM: usize = 30;
/// Code-length alphabet size.
pub const BIT_LENGTH_NUM: usize = 19;

/// Repeat the previous code length 3-6 times (2 extra bits).
const REP_3_6: usize = 16;
/// Repeat a zero length 3-10 times (3 extra bits).
const REPZ_3_10: usize = 17;
/// Repeat a zero length 11-138 times (7 extra bits).
const REPZ_11_138: usize = 18;

/// End-of-block symbol.
pub const EOB_SYMBOL: usize = 256;

const STORED_BLOCK: u32 = 0;
const STATIC_TREES: u32 = 1;
const DYN_TREES: u32 = 2;

/// Order in which code-length code lengths are transmitted.
pub const BL_ORDER: [usize; BIT_LENGTH_NUM] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const BIT4_REVERSE: [u16; 16] = [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

/// Reverse the bits of a 16-bit value.
#[inline]
pub const fn bit_reverse(value: u16) -> u16 {
    BIT4_REVERSE[(value & 0xF) as usize] << 12
        | BIT4_REVERSE[((value >> 4) & 0xF) as usize] << 8
        | BIT4_REVERSE[((value >> 8) & 0xF) as usize] << 4
        | BIT4_REVERSE[(value >> 12) as usize]
}

/// Fixed literal/length codes (RFC 1951 section 3.2.6), bit-reversed.
pub static STATIC_L_CODES: [u16; LITERAL_NUM] = {
    let mut codes = [0u16; LITERAL_NUM];
    let mut i = 0;
    while i < 144 {
        codes[i] = bit_reverse(((0x030 + i) << 8) as u16);
        i += 1;
    }
    while i < 256 {
        codes[i] = bit_reverse(((0x190 - 144 + i) << 7) as u16);
        i += 1;
    }
    while i < 280 {
        codes[i] = bit_reverse(((i - 256) << 9) as u16);
        i += 1;
    }
    while i < LITERAL_NUM {
        codes[i] = bit_reverse(((0x0c0 + i - 280) << 8) as u16);
        i += 1;
    }
    codes
};

/// Fixed literal/length code lengths.
pub static STATIC_L_LENGTHS: [u8; LITERAL_NUM] = {
    let mut lengths = [0u8; LITERAL_NUM];
    let mut i = 0;
    while i < LITERAL_NUM {
        lengths[i] = if i < 144 {
            8
        } else if i < 256 {
            9
        } else if i < 280 {
            7
        } else {
            8
        };
        i += 1;
    }
    lengths
};

/// Fixed distance codes, bit-reversed. All are 5 bits long.
pub static STATIC_D_CODES: [u16; DISTANCE_NUM] = {
    let mut codes = [0u16; DISTANCE_NUM];
    let mut i = 0;
    while i < DISTANCE_NUM {
        codes[i] = bit_reverse((i << 11) as u16);
        i += 1;
    }
    codes
};

/// Fixed distance code lengths.
pub static STATIC_D_LENGTHS: [u8; DISTANCE_NUM] = [5; DISTANCE_NUM];

/// Map `length - 3` (0-255) to its literal/length symbol.
#[inline]
fn lcode(mut length: usize) -> usize {
    if length == 255 {
        return 285;
    }
    let mut code = 257;
    while length >= 8 {
        code += 4;
        length >>= 1;
    }
    code + length
}

/// Map `distance - 1` (0-32767) to its distance symbol.
#[inline]
fn dcode(mut distance: usize) -> usize {
    let mut code = 0;
    while distance >= 4 {
        code += 2;
        distance >>= 1;
    }
    code + distance
}

/// Child slot marking a leaf in the tree-building node array.
const LEAF: usize = usize::MAX;

/// One Huffman alphabet: frequencies in, code lengths and codes out.
#[derive(Debug)]
pub struct Tree {
    freqs: Vec<u16>,
    lengths: Vec<u8>,
    codes: Vec<u16>,
    bl_counts: Vec<i32>,
    num_codes: usize,
    min_num_codes: usize,
    max_length: usize,
    heap: Vec<usize>,
    childs: Vec<usize>,
    values: Vec<u32>,
    depths: Vec<usize>,
}

impl Tree {
    /// Create a tree over `elems` symbols, always transmitting at least
    /// `min_codes` lengths and never exceeding `max_length` bits.
    pub fn new(elems: usize, min_codes: usize, max_length: usize) -> Self {
        Self {
            freqs: vec![0; elems],
            lengths: vec![0; elems],
            codes: vec![0; elems],
            bl_counts: vec![0; max_length],
            num_codes: 0,
            min_num_codes: min_codes,
            max_length,
            heap: vec![0; elems],
            childs: vec![0; 4 * elems],
            values: vec![0; 2 * elems],
            depths: vec![0; 2 * elems],
        }
    }

    /// Clear frequencies and lengths for the next block.
    pub fn reset(&mut self) {
        self.freqs.fill(0);
        self.lengths.fill(0);
        self.num_codes = 0;
    }

    /// Symbol frequencies of the current block.
    #[inline]
    pub fn freqs(&self) -> &[u16] {
        &self.freqs
    }

    /// Code length per symbol, zero for unused symbols.
    #[inline]
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Bit-reversed codes, valid after [`Tree::build_codes`].
    #[inline]
    pub fn codes(&self) -> &[u16] {
        &self.codes
    }

    /// Number of code lengths that will be transmitted.
    #[inline]
    pub fn num_codes(&self) -> usize {
        self.num_codes
    }

    #[inline]
    fn write_symbol(&self, pending: &mut PendingBuffer, code: usize) {
        pending.write_bits(self.codes[code] as u32, self.lengths[code] as u32);
    }

    /// Use the fixed code table instead of a built one.
    pub fn set_static_codes(&mut self, codes: &[u16], lengths: &[u8]) {
        self.codes.copy_from_slice(codes);
        self.lengths.copy_from_slice(lengths);
    }

    /// Assign canonical codes from the code lengths, bit-reversed for
    /// LSB-first packing.
    pub fn build_codes(&mut self) {
        let mut next_code = [0u32; 16];
        let mut code = 0u32;
        for bits in 0..self.max_length {
            next_code[bits] = code;
            code += (self.bl_counts[bits] as u32) << (15 - bits);
        }

        for i in 0..self.num_codes {
            let bits = self.lengths[i] as usize;
            if bits > 0 {
                self.codes[i] = bit_reverse(next_code[bits - 1] as u16);
                next_code[bits - 1] += 1 << (16 - bits);
            }
        }
    }

    /// Build a length-limited Huffman tree from the current frequencies.
    pub fn build_tree(&mut self) -> Result<()> {
        let num_symbols = self.freqs.len();

        // Min-heap of symbols keyed by frequency; equal frequencies keep
        // index order.
        let mut heap_len = 0;
        let mut max_code = 0;
        for n in 0..num_symbols {
            let freq = self.freqs[n];
            if freq != 0 {
                let mut pos = heap_len;
                heap_len += 1;
                while pos > 0 {
                    let ppos = (pos - 1) / 2;
                    if self.freqs[self.heap[ppos]] > freq {
                        self.heap[pos] = self.heap[ppos];
                        pos = ppos;
                    } else {
                        break;
                    }
                }
                self.heap[pos] = n;
                max_code = n;
            }
        }

        // A tree needs two leaves even when at most one symbol occurs.
        while heap_len < 2 {
            let node = if max_code < 2 {
                max_code += 1;
                max_code
            } else {
                0
            };
            self.heap[heap_len] = node;
            heap_len += 1;
        }

        self.num_codes = (max_code + 1).max(self.min_num_codes);

        let num_leafs = heap_len;
        let childs_len = 4 * heap_len - 2;
        let childs = &mut self.childs[..childs_len];
        let values = &mut self.values[..2 * heap_len - 1];
        let heap = &mut self.heap;
        let mut num_nodes = num_leafs;

        for i in 0..heap_len {
            let node = heap[i];
            childs[2 * i] = node;
            childs[2 * i + 1] = LEAF;
            values[i] = (self.freqs[node] as u32) << 8;
            heap[i] = i;
        }

        // Merge the two least frequent nodes until one remains. The low byte
        // of each value is the subtree depth, which breaks frequency ties in
        // favor of shallower trees.
        loop {
            let first = heap[0];
            heap_len -= 1;
            let last = heap[heap_len];

            // Propagate the hole to the leaves of the heap.
            let mut ppos = 0;
            let mut path = 1;
            while path < heap_len {
                if path + 1 < heap_len && values[heap[path]] > values[heap[path + 1]] {
                    path += 1;
                }
                heap[ppos] = heap[path];
                ppos = path;
                path = path * 2 + 1;
            }

            // Sift `last` back up from the hole.
            let last_val = values[last];
            path = ppos;
            while path > 0 {
                let parent = (path - 1) / 2;
                if values[heap[parent]] > last_val {
                    heap[path] = heap[parent];
                    path = parent;
                } else {
                    break;
                }
            }
            heap[path] = last;

            let second = heap[0];

            let node = num_nodes;
            num_nodes += 1;
            childs[2 * node] = first;
            childs[2 * node + 1] = second;
            let min_depth = (values[first] & 0xFF).min(values[second] & 0xFF);
            let node_val = values[first] + values[second] - min_depth + 1;
            values[node] = node_val;

            // Replace the root (`second`) with the new node.
            ppos = 0;
            path = 1;
            while path < heap_len {
                if path + 1 < heap_len && values[heap[path]] > values[heap[path + 1]] {
                    path += 1;
                }
                heap[ppos] = heap[path];
                ppos = path;
                path = ppos * 2 + 1;
            }

            path = ppos;
            while path > 0 {
                let parent = (path - 1) / 2;
                if values[heap[parent]] > node_val {
                    heap[path] = heap[parent];
                    path = parent;
                } else {
                    break;
                }
            }
            heap[path] = node;

            if heap_len <= 1 {
                break;
            }
        }

        if heap[0] != childs_len / 2 - 1 {
            return Err(Error::HuffmanHeapInvariantViolated);
        }

        self.build_length(childs_len);
        Ok(())
    }

    /// Derive code lengths from the node array, limiting them to `max_length`.
    fn build_length(&mut self, childs_len: usize) {
        let childs = &self.childs[..childs_len];
        let num_nodes = childs_len / 2;
        let num_leafs = (num_nodes + 1) / 2;
        let max_length = self.max_length;
        let mut overflow = 0i32;

        self.lengths.fill(0);
        self.bl_counts.fill(0);

        let depths = &mut self.depths[..num_nodes];
        depths[num_nodes - 1] = 0;

        for i in (0..num_nodes).rev() {
            if childs[2 * i + 1] != LEAF {
                let mut bit_length = depths[i] + 1;
                if bit_length > max_length {
                    bit_length = max_length;
                    overflow += 1;
                }
                depths[childs[2 * i]] = bit_length;
                depths[childs[2 * i + 1]] = bit_length;
            } else {
                let bit_length = depths[i];
                self.bl_counts[bit_length - 1] += 1;
                self.lengths[childs[2 * i]] = bit_length as u8;
            }
        }

        if overflow == 0 {
            return;
        }

        // Move leaves from the deepest under-full class down one level until
        // the Kraft sum is restored.
        let mut incr_bit_len = max_length - 1;
        loop {
            loop {
                incr_bit_len -= 1;
                if self.bl_counts[incr_bit_len] != 0 {
                    break;
                }
            }

            loop {
                self.bl_counts[incr_bit_len] -= 1;
                incr_bit_len += 1;
                self.bl_counts[incr_bit_len] += 1;
                overflow -= 1 << (max_length - 1 - incr_bit_len);
                if !(overflow > 0 && incr_bit_len < max_length - 1) {
                    break;
                }
            }

            if overflow <= 0 {
                break;
            }
        }

        // Overflow may now be negative; fix up the two deepest classes.
        self.bl_counts[max_length - 1] += overflow;
        self.bl_counts[max_length - 2] -= overflow;

        // Reassign lengths to leaves. Internal nodes were created in order of
        // increasing frequency, so walking their children from the start gives
        // the rarest leaves first, and those get the longest codes.
        let mut node_ptr = 2 * num_leafs;
        for bits in (1..=max_length).rev() {
            let mut n = self.bl_counts[bits - 1];
            while n > 0 {
                let child_ptr = 2 * childs[node_ptr];
                node_ptr += 1;
                if childs[child_ptr + 1] == LEAF {
                    self.lengths[childs[child_ptr]] = bits as u8;
                    n -= 1;
                }
            }
        }
    }

    /// Total bits for the symbols of this block under the current lengths.
    pub fn encoded_length(&self) -> u32 {
        self.freqs
            .iter()
            .zip(&self.lengths)
            .map(|(&freq, &len)| freq as u32 * len as u32)
            .sum()
    }

    /// How many code-length code lengths a dynamic header must carry for
    /// this code-length tree: through the last nonzero entry in
    /// [`BL_ORDER`], and never fewer than 4.
    fn bl_codes_to_send(&self) -> usize {
        (4..BIT_LENGTH_NUM)
            .rev()
            .find(|&i| self.lengths[BL_ORDER[i]] > 0)
            .map_or(4, |i| i + 1)
    }

    /// Walk the code-length runs of this tree, calling `emit(symbol, repeat)`
    /// for each code-length symbol it would transmit.
    ///
    /// `repeat` is the run count for symbols 16-18 and 1 otherwise.
    fn for_each_length_run(&self, mut emit: impl FnMut(usize, usize)) {
        let mut cur_len: Option<usize> = None;
        let mut i = 0;

        while i < self.num_codes {
            let mut count = 1;
            let next_len = self.lengths[i] as usize;
            let max_count;
            let min_count = 3;
            if next_len == 0 {
                max_count = 138;
            } else {
                max_count = 6;
                if cur_len != Some(next_len) {
                    emit(next_len, 1);
                    count = 0;
                }
            }

            cur_len = Some(next_len);
            i += 1;

            while i < self.num_codes && next_len == self.lengths[i] as usize {
                i += 1;
                count += 1;
                if count >= max_count {
                    break;
                }
            }

            if count < min_count {
                for _ in 0..count {
                    emit(next_len, 1);
                }
            } else if next_len != 0 {
                emit(REP_3_6, count);
            } else if count <= 10 {
                emit(REPZ_3_10, count);
            } else {
                emit(REPZ_11_138, count);
            }
        }
    }

    /// Count the code-length symbols this tree needs into `bl_tree`.
    pub fn calc_bl_freq(&self, bl_tree: &mut Tree) {
        self.for_each_length_run(|symbol, _| bl_tree.freqs[symbol] += 1);
    }

    /// Transmit this tree's code lengths using `bl_tree`.
    pub fn write_tree(&self, bl_tree: &Tree, pending: &mut PendingBuffer) {
        self.for_each_length_run(|symbol, repeat| {
            bl_tree.write_symbol(pending, symbol);
            match symbol {
                REP_3_6 => pending.write_bits(repeat as u32 - 3, 2),
                REPZ_3_10 => pending.write_bits(repeat as u32 - 3, 3),
                REPZ_11_138 => pending.write_bits(repeat as u32 - 11, 7),
                _ => {}
            }
        });
    }
}

/// Which encoding a block was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// BTYPE 00, raw bytes.
    Stored,
    /// BTYPE 01, fixed codes.
    Static,
    /// BTYPE 10, codes transmitted in the block header.
    Dynamic,
}

/// Token tally and block writer for the deflater.
#[derive(Debug)]
pub struct HuffmanCoder {
    pending: PendingBuffer,
    literal_tree: Tree,
    dist_tree: Tree,
    bl_tree: Tree,
    d_buf: Box<[u16]>,
    l_buf: Box<[u8]>,
    last_lit: usize,
    extra_bits: u32,
}

impl HuffmanCoder {
    /// Create a coder with empty tallies and an empty pending buffer.
    pub fn new() -> Self {
        Self {
            pending: PendingBuffer::new(),
            literal_tree: Tree::new(LITERAL_NUM, 257, 15),
            dist_tree: Tree::new(DISTANCE_NUM, 1, 15),
            bl_tree: Tree::new(BIT_LENGTH_NUM, 4, 7),
            d_buf: vec![0; TALLY_BUF_SIZE].into_boxed_slice(),
            l_buf: vec![0; TALLY_BUF_SIZE].into_boxed_slice(),
            last_lit: 0,
            extra_bits: 0,
        }
    }

    /// Clear the tallies and trees. Pending output is untouched.
    pub fn reset(&mut self) {
        self.last_lit = 0;
        self.extra_bits = 0;
        self.literal_tree.reset();
        self.dist_tree.reset();
        self.bl_tree.reset();
    }

    /// Output bits not yet handed to the caller.
    #[inline]
    pub fn pending(&self) -> &PendingBuffer {
        &self.pending
    }

    /// Mutable access to the pending output.
    #[inline]
    pub fn pending_mut(&mut self) -> &mut PendingBuffer {
        &mut self.pending
    }

    /// Free the tally buffers and pending storage.
    pub(crate) fn release(&mut self) {
        self.reset();
        self.pending.release();
        self.d_buf = Box::new([]);
        self.l_buf = Box::new([]);
    }

    /// Number of tokens tallied in the current block.
    #[inline]
    pub fn tallied(&self) -> usize {
        self.last_lit
    }

    /// Whether the tally buffers need a block flush.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.last_lit >= TALLY_BUF_SIZE
    }

    /// Record a literal byte. Returns true when the block is full.
    #[inline]
    pub fn tally_lit(&mut self, literal: u8) -> bool {
        self.d_buf[self.last_lit] = 0;
        self.l_buf[self.last_lit] = literal;
        self.last_lit += 1;
        self.literal_tree.freqs[literal as usize] += 1;
        self.is_full()
    }

    /// Record a match of `length` bytes at `distance`. Returns true when the
    /// block is full.
    #[inline]
    pub fn tally_dist(&mut self, distance: usize, length: usize) -> bool {
        debug_assert!((3..=258).contains(&length));
        debug_assert!((1..=32768).contains(&distance));

        self.d_buf[self.last_lit] = distance as u16;
        self.l_buf[self.last_lit] = (length - 3) as u8;
        self.last_lit += 1;

        let lc = lcode(length - 3);
        self.literal_tree.freqs[lc] += 1;
        if (265..285).contains(&lc) {
            self.extra_bits += ((lc - 261) / 4) as u32;
        }

        let dc = dcode(distance - 1);
        self.dist_tree.freqs[dc] += 1;
        if dc >= 4 {
            self.extra_bits += (dc / 2 - 1) as u32;
        }

        self.is_full()
    }

    fn send_all_trees(&mut self, bl_tree_codes: usize) {
        self.bl_tree.build_codes();
        self.literal_tree.build_codes();
        self.dist_tree.build_codes();

        let pending = &mut self.pending;
        pending.write_bits((self.literal_tree.num_codes - 257) as u32, 5);
        pending.write_bits((self.dist_tree.num_codes - 1) as u32, 5);
        pending.write_bits((bl_tree_codes - 4) as u32, 4);
        for &symbol in &BL_ORDER[..bl_tree_codes] {
            pending.write_bits(self.bl_tree.lengths[symbol] as u32, 3);
        }
        self.literal_tree.write_tree(&self.bl_tree, pending);
        self.dist_tree.write_tree(&self.bl_tree, pending);
    }

    /// Write the tallied tokens with the current codes, then end of block.
    fn compress_block(&mut self) {
        let pending = &mut self.pending;
        for i in 0..self.last_lit {
            let litlen = self.l_buf[i] as usize;
            let dist = self.d_buf[i] as usize;
            if dist != 0 {
                let dist = dist - 1;
                let lc = lcode(litlen);
                self.literal_tree.write_symbol(pending, lc);

                let bits = (lc as i32 - 261) / 4;
                if bits > 0 && bits <= 5 {
                    pending.write_bits((litlen & ((1 << bits) - 1)) as u32, bits as u32);
                }

                let dc = dcode(dist);
                self.dist_tree.write_symbol(pending, dc);

                let bits = dc as i32 / 2 - 1;
                if bits > 0 {
                    pending.write_bits((dist & ((1 << bits) - 1)) as u32, bits as u32);
                }
            } else {
                self.literal_tree.write_symbol(pending, litlen);
            }
        }
        self.literal_tree.write_symbol(pending, EOB_SYMBOL);
    }

    /// Write `stored` as an uncompressed block.
    pub fn flush_stored_block(&mut self, stored: &[u8], last_block: bool) {
        debug_assert!(stored.len() <= MAX_BLOCK_SIZE);
        log::trace!("stored block: {} bytes, last={last_block}", stored.len());

        let len = stored.len() as u16;
        self.pending
            .write_bits((STORED_BLOCK << 1) + last_block as u32, 3);
        self.pending.align_to_byte();
        self.pending.write_short(len);
        self.pending.write_short(!len);
        self.pending.write_block(stored);
        self.reset();
    }

    /// Encode the tallied block in the cheapest form.
    ///
    /// `stored` is the raw input the tokens came from when it is still in the
    /// window; without it the stored encoding is not considered.
    pub fn flush_block(&mut self, stored: Option<&[u8]>, last_block: bool) -> Result<BlockType> {
        self.literal_tree.freqs[EOB_SYMBOL] += 1;

        self.literal_tree.build_tree()?;
        self.dist_tree.build_tree()?;

        self.literal_tree.calc_bl_freq(&mut self.bl_tree);
        self.dist_tree.calc_bl_freq(&mut self.bl_tree);

        self.bl_tree.build_tree()?;

        let bl_tree_codes = self.bl_tree.bl_codes_to_send();

        let mut opt_len = 14
            + bl_tree_codes as u32 * 3
            + self.bl_tree.encoded_length()
            + self.literal_tree.encoded_length()
            + self.dist_tree.encoded_length()
            + self.extra_bits;

        let static_len = self.extra_bits
            + self
                .literal_tree
                .freqs
                .iter()
                .zip(STATIC_L_LENGTHS.iter())
                .map(|(&f, &l)| f as u32 * l as u32)
                .sum::<u32>()
            + self
                .dist_tree
                .freqs
                .iter()
                .zip(STATIC_D_LENGTHS.iter())
                .map(|(&f, &l)| f as u32 * l as u32)
                .sum::<u32>();

        let dynamic_len = opt_len;
        if opt_len >= static_len {
            opt_len = static_len;
        }

        let block_type = match stored {
            Some(bytes) if bytes.len() <= MAX_BLOCK_SIZE && bytes.len() + 4 < (opt_len >> 3) as usize => {
                BlockType::Stored
            }
            _ if opt_len == static_len => BlockType::Static,
            _ => BlockType::Dynamic,
        };

        log::trace!(
            "block: {} tokens, {:?}, dynamic={dynamic_len} static={static_len} stored={:?} bits, last={last_block}",
            self.last_lit,
            block_type,
            stored.map(|s| (s.len() + 4) * 8),
        );

        match (block_type, stored) {
            (BlockType::Stored, Some(bytes)) => self.flush_stored_block(bytes, last_block),
            (BlockType::Static, _) => {
                self.pending
                    .write_bits((STATIC_TREES << 1) + last_block as u32, 3);
                self.literal_tree
                    .set_static_codes(&STATIC_L_CODES, &STATIC_L_LENGTHS);
                self.dist_tree
                    .set_static_codes(&STATIC_D_CODES, &STATIC_D_LENGTHS);
                self.compress_block();
                self.reset();
            }
            _ => {
                self.pending
                    .write_bits((DYN_TREES << 1) + last_block as u32, 3);
                self.send_all_trees(bl_tree_codes);
                self.compress_block();
                self.reset();
            }
        }

        Ok(block_type)
    }
}

impl Default for HuffmanCoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::DeflateDecoder;
    use std::io::Read;

    fn inflate(raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        DeflateDecoder::new(raw)
            .read_to_end(&mut out)
            .expect("valid deflate stream");
        out
    }

    fn kraft_sum(lengths: &[u8]) -> f64 {
        lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 2f64.powi(-(l as i32)))
            .sum()
    }

    #[test]
    fn test_bit_reverse() {
        assert_eq!(bit_reverse(0x0001), 0x8000);
        assert_eq!(bit_reverse(0x8000), 0x0001);
        assert_eq!(bit_reverse(0x1234), 0x2C48);
        assert_eq!(bit_reverse(bit_reverse(0xBEEF)), 0xBEEF);
    }

    #[test]
    fn test_lcode_dcode_boundaries() {
        // length 3 -> 257, 10 -> 264, 11 -> 265, 258 -> 285
        assert_eq!(lcode(0), 257);
        assert_eq!(lcode(7), 264);
        assert_eq!(lcode(8), 265);
        assert_eq!(lcode(195 - 3), 283);
        assert_eq!(lcode(227 - 3), 284);
        assert_eq!(lcode(257 - 3), 284);
        assert_eq!(lcode(255), 285);
        // distance 1 -> 0, 4 -> 3, 5 -> 4, 32768 -> 29
        assert_eq!(dcode(0), 0);
        assert_eq!(dcode(3), 3);
        assert_eq!(dcode(4), 4);
        assert_eq!(dcode(24576), 29);
        assert_eq!(dcode(32767), 29);
    }

    #[test]
    fn test_static_tables_match_rfc() {
        // Literal 0 is 00110000, 144 is 110010000, 256 is 0000000, 280 is 11000000.
        assert_eq!(STATIC_L_CODES[0], bit_reverse(0b0011_0000 << 8));
        assert_eq!(STATIC_L_LENGTHS[0], 8);
        assert_eq!(STATIC_L_CODES[144], bit_reverse(0b1_1001_0000 << 7));
        assert_eq!(STATIC_L_LENGTHS[144], 9);
        assert_eq!(STATIC_L_CODES[256], 0);
        assert_eq!(STATIC_L_LENGTHS[256], 7);
        assert_eq!(STATIC_L_CODES[280], bit_reverse(0b1100_0000 << 8));
        assert_eq!(STATIC_L_CODES[285], bit_reverse(0b1100_0101 << 8));
        assert_eq!(STATIC_L_LENGTHS[285], 8);
        assert_eq!(STATIC_D_CODES[1], bit_reverse(1 << 11));
        // Symbols 286 and 287 are reserved, so the fixed table is not complete.
        assert!(kraft_sum(&STATIC_L_LENGTHS) < 1.0);
    }

    #[test]
    fn test_bl_codes_to_send_keeps_index_four() {
        let mut bl_tree = Tree::new(BIT_LENGTH_NUM, 4, 7);
        assert_eq!(bl_tree.bl_codes_to_send(), 4);

        // Only the run codes, zero, and length 8 (BL_ORDER[4]) are in use.
        assert_eq!(BL_ORDER[4], 8);
        for symbol in [REP_3_6, REPZ_3_10, REPZ_11_138, 0, 8] {
            bl_tree.lengths[symbol] = 3;
        }
        assert_eq!(bl_tree.bl_codes_to_send(), 5);

        bl_tree.lengths[8] = 0;
        assert_eq!(bl_tree.bl_codes_to_send(), 4);

        // Length 15 is the last entry of the order.
        bl_tree.lengths[15] = 2;
        assert_eq!(bl_tree.bl_codes_to_send(), BIT_LENGTH_NUM);
    }

    #[test]
    fn test_build_tree_two_symbols() {
        let mut tree = Tree::new(DISTANCE_NUM, 1, 15);
        tree.freqs[3] = 10;
        tree.freqs[7] = 1;
        tree.build_tree().unwrap();
        assert_eq!(tree.lengths[3], 1);
        assert_eq!(tree.lengths[7], 1);
        assert_eq!(tree.num_codes(), 8);
    }

    #[test]
    fn test_build_tree_single_symbol_gets_partner() {
        let mut tree = Tree::new(DISTANCE_NUM, 1, 15);
        tree.freqs[0] = 5;
        tree.build_tree().unwrap();
        assert_eq!(tree.lengths[0], 1);
        assert_eq!(tree.lengths[1], 1);
        assert_eq!(tree.num_codes(), 2);
    }

    #[test]
    fn test_build_tree_empty() {
        let mut tree = Tree::new(DISTANCE_NUM, 1, 15);
        tree.build_tree().unwrap();
        assert_eq!(tree.lengths.iter().filter(|&&l| l > 0).count(), 2);
    }

    #[test]
    fn test_build_tree_respects_max_length() {
        // Fibonacci frequencies force a degenerate tree deeper than 7 bits.
        let mut tree = Tree::new(BIT_LENGTH_NUM, 4, 7);
        let mut a = 1u16;
        let mut b = 1u16;
        for i in 0..BIT_LENGTH_NUM {
            tree.freqs[i] = a;
            let next = a.saturating_add(b);
            a = b;
            b = next;
        }
        tree.build_tree().unwrap();

        assert!(tree.lengths.iter().all(|&l| l >= 1 && l <= 7));
        assert!(kraft_sum(&tree.lengths) <= 1.0 + 1e-9);
    }

    #[test]
    fn test_build_tree_kraft_literal_alphabet() {
        let mut tree = Tree::new(LITERAL_NUM, 257, 15);
        for i in 0..LITERAL_NUM {
            tree.freqs[i] = ((i * 37) % 101) as u16;
        }
        tree.build_tree().unwrap();
        let sum = kraft_sum(&tree.lengths);
        assert!((sum - 1.0).abs() < 1e-9, "kraft sum {sum}");
        assert!(tree.lengths.iter().all(|&l| l <= 15));
    }

    #[test]
    fn test_build_codes_prefix_free() {
        let mut tree = Tree::new(LITERAL_NUM, 257, 15);
        for i in 0..LITERAL_NUM {
            tree.freqs[i] = (1 + (i % 13) * (i % 7)) as u16;
        }
        tree.build_tree().unwrap();
        tree.build_codes();

        let codes: Vec<(u16, u8)> = (0..tree.num_codes())
            .filter(|&i| tree.lengths[i] > 0)
            .map(|i| (tree.codes[i], tree.lengths[i]))
            .collect();

        for (i, &(code_a, len_a)) in codes.iter().enumerate() {
            for &(code_b, len_b) in &codes[i + 1..] {
                let shorter = len_a.min(len_b);
                let mask = (1u32 << shorter) - 1;
                assert_ne!(
                    code_a as u32 & mask,
                    code_b as u32 & mask,
                    "codes share a {shorter}-bit prefix"
                );
            }
        }
    }

    #[test]
    fn test_build_codes_canonical_order() {
        // Lengths {2, 1, 3, 3} give codes 10, 0, 110, 111 (RFC 1951 example style).
        let mut tree = Tree::new(4, 1, 15);
        tree.lengths.copy_from_slice(&[2, 1, 3, 3]);
        tree.bl_counts.fill(0);
        tree.bl_counts[0] = 1;
        tree.bl_counts[1] = 1;
        tree.bl_counts[2] = 2;
        tree.num_codes = 4;
        tree.build_codes();
        assert_eq!(tree.codes[1], bit_reverse(0b0 << 15));
        assert_eq!(tree.codes[0], bit_reverse(0b10 << 14));
        assert_eq!(tree.codes[2], bit_reverse(0b110 << 13));
        assert_eq!(tree.codes[3], bit_reverse(0b111 << 13));
    }

    #[test]
    fn test_tally_reports_full() {
        let mut coder = HuffmanCoder::new();
        for i in 0..TALLY_BUF_SIZE - 1 {
            assert!(!coder.tally_lit(i as u8));
        }
        assert!(coder.tally_dist(1, 3));
        assert!(coder.is_full());
        coder.reset();
        assert_eq!(coder.tallied(), 0);
    }

    #[test]
    fn test_empty_final_block_is_static() {
        let mut coder = HuffmanCoder::new();
        let kind = coder.flush_block(Some(&[][..]), true).unwrap();
        assert_eq!(kind, BlockType::Static);
        coder.pending_mut().align_to_byte();
        assert_eq!(coder.pending_mut().to_vec(), vec![0x03, 0x00]);
    }

    #[test]
    fn test_literal_block_round_trips() {
        let data = b"abracadabra, abracadabra";
        let mut coder = HuffmanCoder::new();
        for &b in data.iter() {
            coder.tally_lit(b);
        }
        coder.flush_block(None, true).unwrap();
        coder.pending_mut().align_to_byte();
        let raw = coder.pending_mut().to_vec();
        assert_eq!(inflate(&raw), data);
    }

    #[test]
    fn test_match_tokens_round_trip() {
        // "abc" then a 12-byte match at distance 3, then a 258-byte run.
        let mut coder = HuffmanCoder::new();
        for &b in b"abc" {
            coder.tally_lit(b);
        }
        coder.tally_dist(3, 12);
        coder.tally_lit(b'z');
        coder.tally_dist(1, 258);
        coder.flush_block(None, true).unwrap();
        coder.pending_mut().align_to_byte();
        let raw = coder.pending_mut().to_vec();

        let mut expected = b"abc".repeat(5);
        expected.push(b'z');
        expected.extend(std::iter::repeat(b'z').take(258));
        assert_eq!(inflate(&raw), expected);
    }

    #[test]
    fn test_dynamic_block_chosen_for_skewed_input() {
        let mut coder = HuffmanCoder::new();
        let mut data = Vec::new();
        for i in 0..4000 {
            let b = if i % 10 == 0 { b'b' } else { b'a' };
            data.push(b);
            coder.tally_lit(b);
        }
        let kind = coder.flush_block(None, true).unwrap();
        assert_eq!(kind, BlockType::Dynamic);
        coder.pending_mut().align_to_byte();
        let raw = coder.pending_mut().to_vec();
        assert!(raw.len() < 700);
        assert_eq!(inflate(&raw), data);
    }

    #[test]
    fn test_stored_block_chosen_for_noise() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        let data: Vec<u8> = (0..2000).map(|_| rng.gen()).collect();
        let mut coder = HuffmanCoder::new();
        for &b in &data {
            coder.tally_lit(b);
        }
        let kind = coder.flush_block(Some(&data[..]), true).unwrap();
        assert_eq!(kind, BlockType::Stored);
        let raw = coder.pending_mut().to_vec();
        assert_eq!(raw.len(), data.len() + 5);
        assert_eq!(inflate(&raw), data);
    }

    #[test]
    fn test_long_zero_runs_use_repeat_codes() {
        // Only a handful of literals far apart forces 17/18 runs of zero lengths.
        let mut coder = HuffmanCoder::new();
        let mut data = Vec::new();
        for i in 0..3000 {
            let b = [0u8, 100, 200, 255][(i * 7 + i / 5) % 4];
            data.push(b);
            coder.tally_lit(b);
        }
        coder.flush_block(None, true).unwrap();
        coder.pending_mut().align_to_byte();
        let raw = coder.pending_mut().to_vec();
        assert_eq!(inflate(&raw), data);
    }
}
