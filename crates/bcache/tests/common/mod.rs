//! Shared helpers for buffer cache integration tests.

use std::sync::Mutex;

use device::{BlockDriver, DeviceType, Driver};

/// An in-memory block device that records which blocks were read and
/// written, so tests can observe cache hits and misses from outside.
pub struct CountingDisk {
    data: Mutex<Vec<u8>>,
    block_size: usize,
    reads: Mutex<Vec<usize>>,
    writes: Mutex<Vec<usize>>,
}

impl CountingDisk {
    pub fn new(blocks: usize, block_size: usize) -> Self {
        CountingDisk {
            data: Mutex::new(vec![0u8; blocks * block_size]),
            block_size,
            reads: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// How many device reads hit the given block so far.
    pub fn reads_of(&self, block_id: usize) -> usize {
        self.reads.lock().unwrap().iter().filter(|&&b| b == block_id).count()
    }

    #[allow(dead_code)]
    pub fn writes_of(&self, block_id: usize) -> usize {
        self.writes.lock().unwrap().iter().filter(|&&b| b == block_id).count()
    }
}

impl Driver for CountingDisk {
    fn try_handle_interrupt(&self, _irq: Option<usize>) -> bool {
        false
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Block
    }

    fn get_id(&self) -> String {
        "countingdisk_0".into()
    }

    fn as_block(&self) -> Option<&dyn BlockDriver> {
        Some(self)
    }
}

impl BlockDriver for CountingDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool {
        if buf.len() != self.block_size {
            return false;
        }
        let data = self.data.lock().unwrap();
        let offset = block_id * self.block_size;
        if offset + self.block_size > data.len() {
            return false;
        }
        buf.copy_from_slice(&data[offset..offset + self.block_size]);
        self.reads.lock().unwrap().push(block_id);
        true
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool {
        if buf.len() != self.block_size {
            return false;
        }
        let mut data = self.data.lock().unwrap();
        let offset = block_id * self.block_size;
        if offset + self.block_size > data.len() {
            return false;
        }
        data[offset..offset + self.block_size].copy_from_slice(buf);
        self.writes.lock().unwrap().push(block_id);
        true
    }

    fn flush(&self) -> bool {
        true
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn total_blocks(&self) -> usize {
        self.data.lock().unwrap().len() / self.block_size
    }
}
