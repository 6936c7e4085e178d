/// Open stock segments and the free length left on each, in order of opening.
#[derive(Debug, Clone)]
pub struct BinLedger {
    stock_length: u32,
    remaining: Vec<u32>,
    free: u64,
}

impl BinLedger {
    pub fn new(stock_length: u32) -> Self {
        Self::with_capacity(stock_length, 0)
    }

    /// Creates an empty ledger with room for `bins` bins without reallocating.
    pub fn with_capacity(stock_length: u32, bins: usize) -> Self {
        Self {
            stock_length,
            remaining: Vec::with_capacity(bins),
            free: 0,
        }
    }

    pub fn stock_length(&self) -> u32 {
        self.stock_length
    }

    pub fn open_count(&self) -> usize {
        self.remaining.len()
    }

    pub fn remaining(&self) -> &[u32] {
        &self.remaining
    }

    pub fn fits(&self, bin: usize, length: u32) -> bool {
        self.remaining[bin] >= length
    }

    /// Lowest-ordinal open bin with room for `length`.
    pub fn first_fit(&self, length: u32) -> Option<usize> {
        self.remaining.iter().position(|&free| free >= length)
    }

    pub fn insert(&mut self, bin: usize, length: u32) {
        debug_assert!(self.fits(bin, length), "bin {bin} overfilled");
        self.remaining[bin] -= length;
        self.free -= length as u64;
    }

    /// Undoes a matching [`BinLedger::insert`].
    pub fn remove(&mut self, bin: usize, length: u32) {
        self.remaining[bin] += length;
        self.free += length as u64;
        debug_assert!(self.remaining[bin] <= self.stock_length);
    }

    /// Opens a new bin holding a single piece and returns its ordinal.
    pub fn open(&mut self, length: u32) -> usize {
        debug_assert!(length <= self.stock_length);
        let free = self.stock_length - length;
        self.remaining.push(free);
        self.free += free as u64;
        self.remaining.len() - 1
    }

    /// Closes the most recently opened bin, which must hold only `length`.
    pub fn close(&mut self, length: u32) {
        let free = self.remaining.pop();
        debug_assert_eq!(free, Some(self.stock_length - length));
        self.free -= free.unwrap_or_default() as u64;
    }

    /// Free length summed over every open bin.
    pub fn waste(&self) -> u64 {
        self.free
    }
}
