//! 缓冲区缓存实现
//!
//! 固定容量的槽位池按哈希桶组织：槽位的载荷（块数据 + 有效位）
//! 由各自的睡眠锁保护，簿记（身份、引用计数、LRU 时间戳）归属
//! 当前所在桶、由该桶的自旋锁保护。未命中时的驱逐由一把全局
//! 驱逐锁串行化，并在所有桶上做“渐进收缩持锁范围”的 LRU 扫描。
//!
//! # 锁次序
//!
//! 1. 桶锁之间按桶号升序获取（驱逐扫描）；
//! 2. 先放桶锁、再拿驱逐锁（未命中路径），拿到驱逐锁后必须重查目标桶；
//! 3. 睡眠锁（内容锁）永远最后获取，且获取时不持有任何自旋锁。
//!
//! 这套次序加上重查，保证同一 (dev, blockno) 不会出现两份在册条目。

use alloc::sync::Arc;
use alloc::vec::Vec;

use device::{BlockDriver, TickSource};
use sync::{SleepLock, SleepLockGuard, SpinLock, SpinLockGuard};

use crate::config::{BSIZE, BUCKET_COUNT, NBUF, bucket_index};

/// 槽位载荷：块数据与它的状态位，整体处于内容锁之下。
struct BlockPayload {
    /// 载荷是否反映盘上内容
    valid: bool,
    /// 是否有设备操作正占有载荷
    disk_owned: bool,
    /// 一个磁盘块的数据
    bytes: [u8; BSIZE],
}

impl BlockPayload {
    const fn empty() -> Self {
        BlockPayload {
            valid: false,
            disk_owned: false,
            bytes: [0; BSIZE],
        }
    }
}

/// 池中的一个缓存槽位。载荷之外的簿记存放在所属桶里。
struct Slot {
    content: SleepLock<BlockPayload>,
}

/// 桶内的一条簿记记录，跟随驱逐在桶间迁移。
struct BufMeta {
    /// 对应槽位在池中的下标
    slot: usize,
    /// 身份：设备号
    dev: u32,
    /// 身份：块号
    blockno: u32,
    /// 活跃持有者数量；为 0 时才是驱逐候选
    refcnt: u32,
    /// 引用计数归零时刻的滴答值，仅在 refcnt == 0 时有意义
    lastuse: u64,
}

impl BufMeta {
    /// 启动时的未定身份记录。
    fn unidentified(slot: usize) -> Self {
        BufMeta {
            slot,
            dev: 0,
            blockno: 0,
            refcnt: 0,
            lastuse: 0,
        }
    }
}

/// 一个哈希桶：当前归属本桶的簿记记录。
///
/// `swap_remove`/`push` 提供 O(1) 的摘除与挂入。
struct Bucket {
    entries: Vec<BufMeta>,
}

/// 驱逐扫描中“目前最优”的候选：持着它所在桶的锁。
struct Victim<'a> {
    bucket_idx: usize,
    guard: SpinLockGuard<'a, Bucket>,
    pos: usize,
}

/// 块缓冲区缓存。
///
/// 池在构造时一次成形，之后不增不减。向上只暴露
/// [`read`](BufferCache::read)、[`unpin`](BufferCache::unpin) 和
/// [`BufGuard`] 上的操作；查找/驱逐细节不外漏。
pub struct BufferCache {
    driver: Arc<dyn BlockDriver>,
    clock: Arc<dyn TickSource>,
    /// 串行化所有未命中处理的全局驱逐锁
    eviction_lock: SpinLock<()>,
    buckets: [SpinLock<Bucket>; BUCKET_COUNT],
    slots: Vec<Slot>,
}

impl BufferCache {
    /// 创建缓冲区缓存，绑定块设备与滴答时钟。
    ///
    /// 全部 [`NBUF`] 个槽位初始归于 0 号桶、身份未定。
    pub fn new(driver: Arc<dyn BlockDriver>, clock: Arc<dyn TickSource>) -> Self {
        let mut buckets: [SpinLock<Bucket>; BUCKET_COUNT] =
            core::array::from_fn(|_| SpinLock::new(Bucket { entries: Vec::new() }));
        buckets[0] = SpinLock::new(Bucket {
            entries: (0..NBUF).map(BufMeta::unidentified).collect(),
        });
        log::info!(
            "buffer cache: {} slots in {} buckets, device {}",
            NBUF,
            BUCKET_COUNT,
            driver.get_id()
        );
        BufferCache {
            driver,
            clock,
            eviction_lock: SpinLock::new(()),
            buckets,
            slots: (0..NBUF)
                .map(|_| Slot {
                    content: SleepLock::new(BlockPayload::empty()),
                })
                .collect(),
        }
    }

    /// 在目标桶里查找在册条目；命中则在桶锁下把引用计数加一。
    fn lookup(&self, key: usize, dev: u32, blockno: u32) -> Option<usize> {
        let mut bucket = self.buckets[key].lock();
        let meta = bucket
            .entries
            .iter_mut()
            .find(|m| m.dev == dev && m.blockno == blockno)?;
        meta.refcnt += 1;
        Some(meta.slot)
    }

    /// 查找或分配给定块的缓存槽位，返回持有内容锁的句柄。
    ///
    /// 未命中时在驱逐锁下重查目标桶（另一执行流可能赶在我们之前
    /// 插入了同一个键），仍未命中才做全桶 LRU 扫描驱逐。
    /// 没有任何可驱逐槽位属于资源耗尽，直接崩溃。
    fn get(&self, dev: u32, blockno: u32) -> BufGuard<'_> {
        let key = bucket_index(dev, blockno);

        // 快路径：只碰目标桶的锁
        if let Some(slot) = self.lookup(key, dev, blockno) {
            return self.finish_get(slot, dev, blockno);
        }

        // 慢路径：所有未命中处理在驱逐锁下串行
        let eviction = self.eviction_lock.lock();

        // 必须重查：驱逐锁到手之前别人可能已插入同一个键
        if let Some(slot) = self.lookup(key, dev, blockno) {
            drop(eviction);
            return self.finish_get(slot, dev, blockno);
        }

        // 全桶扫描，挑全局 lastuse 最小的无引用槽位。
        // 按桶号升序访问；某桶产出新的最优候选时挂着它的锁、
        // 放掉上一个候选桶的锁，否则立即放锁。扫描结束时至多
        // 还持有一把桶锁（最优候选所在的那把），使候选不会被
        // 并发抢走。
        let mut best: Option<Victim<'_>> = None;
        for i in 0..BUCKET_COUNT {
            let bucket = self.buckets[i].lock();
            let mut found: Option<usize> = None;
            for (pos, meta) in bucket.entries.iter().enumerate() {
                if meta.refcnt != 0 {
                    continue;
                }
                // 严格小于：时间戳相同时先遇到的候选获胜
                let beats = match (&found, &best) {
                    (Some(p), _) => meta.lastuse < bucket.entries[*p].lastuse,
                    (None, Some(b)) => meta.lastuse < b.guard.entries[b.pos].lastuse,
                    (None, None) => true,
                };
                if beats {
                    found = Some(pos);
                }
            }
            if let Some(pos) = found {
                // 赋值的同时释放上一个候选桶的锁
                best = Some(Victim {
                    bucket_idx: i,
                    guard: bucket,
                    pos,
                });
            }
        }

        let Some(Victim {
            bucket_idx,
            mut guard,
            pos,
        }) = best
        else {
            panic!("bcache: no free buffers");
        };
        let slot = guard.entries[pos].slot;

        // 复位载荷。候选 refcnt == 0 且释放总是先放内容锁再减计数，
        // 因此内容锁此刻必然空闲；拿不到就是不变量被破坏。
        {
            let Some(mut payload) = self.slots[slot].content.try_lock() else {
                panic!("bcache: evicting a locked buffer");
            };
            payload.valid = false;
        }

        if bucket_idx == key {
            let meta = &mut guard.entries[pos];
            meta.dev = dev;
            meta.blockno = blockno;
            meta.refcnt = 1;
            drop(guard);
        } else {
            // 跨桶迁移：先从捐出桶摘除并放锁，再挂入目标桶。
            // 摘除之后、挂入之前，该槽位不在任何桶里，只有当前
            // 执行流（驱逐锁持有者）能触及它。
            let mut meta = guard.entries.swap_remove(pos);
            drop(guard);
            meta.dev = dev;
            meta.blockno = blockno;
            meta.refcnt = 1;
            let mut target = self.buckets[key].lock();
            target.entries.push(meta);
        }

        drop(eviction);
        self.finish_get(slot, dev, blockno)
    }

    /// 引用计数已拿到手，阻塞获取内容锁并组装句柄。
    fn finish_get(&self, slot: usize, dev: u32, blockno: u32) -> BufGuard<'_> {
        let content = self.slots[slot].content.lock();
        BufGuard {
            cache: self,
            slot,
            dev,
            blockno,
            content: Some(content),
        }
    }

    /// 返回给定块的已锁定缓冲，内容保证与盘上一致。
    ///
    /// 载荷无效（新驱逐来的槽位）时做一次同步设备读。
    pub fn read(&self, dev: u32, blockno: u32) -> BufGuard<'_> {
        let mut buf = self.get(dev, blockno);
        let payload = buf.content.as_mut().unwrap();
        if !payload.valid {
            debug_assert!(!payload.disk_owned);
            payload.disk_owned = true;
            let ok = self.driver.read_block(blockno as usize, &mut payload.bytes);
            payload.disk_owned = false;
            if !ok {
                panic!("bcache: disk read failed (dev={dev}, block={blockno})");
            }
            payload.valid = true;
        }
        buf
    }

    /// 释放一次由 [`BufGuard::pin`] 增加的引用。
    ///
    /// 只碰桶锁，不碰内容锁；通常在上层完成一组关联操作后调用。
    ///
    /// # Panics
    /// 块不在缓存中、或引用计数已为零时 panic：两者都说明
    /// pin/unpin 没有成对，属于调用方的契约违规。
    pub fn unpin(&self, dev: u32, blockno: u32) {
        let key = bucket_index(dev, blockno);
        let mut bucket = self.buckets[key].lock();
        let Some(meta) = bucket
            .entries
            .iter_mut()
            .find(|m| m.dev == dev && m.blockno == blockno)
        else {
            panic!("bcache: unpin of uncached block (dev={dev}, block={blockno})");
        };
        if meta.refcnt == 0 {
            panic!("bcache: unpin without matching pin (dev={dev}, block={blockno})");
        }
        meta.refcnt -= 1;
    }

    /// 给定块当前所在的桶号，用于统计与测试观察。
    pub fn bucket_of(&self, dev: u32, blockno: u32) -> Option<usize> {
        for (i, bucket) in self.buckets.iter().enumerate() {
            let bucket = bucket.lock();
            if bucket
                .entries
                .iter()
                .any(|m| m.dev == dev && m.blockno == blockno)
            {
                return Some(i);
            }
        }
        None
    }
}

/// 已锁定缓冲的 RAII 句柄。
///
/// 持有句柄即持有该槽位的内容锁；句柄离开作用域时先释放内容锁，
/// 再在桶锁下把引用计数减一，归零时刻记下 LRU 时间戳。
pub struct BufGuard<'a> {
    cache: &'a BufferCache,
    slot: usize,
    dev: u32,
    blockno: u32,
    /// 在整个生命周期内保持 Some；Drop 时先行取出以便先放内容锁
    content: Option<SleepLockGuard<'a, BlockPayload>>,
}

impl BufGuard<'_> {
    /// 缓冲对应的设备号。
    pub fn dev(&self) -> u32 {
        self.dev
    }

    /// 缓冲对应的块号。
    pub fn blockno(&self) -> u32 {
        self.blockno
    }

    /// 只读访问块数据。
    pub fn data(&self) -> &[u8; BSIZE] {
        &self.content.as_ref().unwrap().bytes
    }

    /// 可写访问块数据。写完后需调用 [`BufGuard::write`] 才会落盘。
    pub fn data_mut(&mut self) -> &mut [u8; BSIZE] {
        &mut self.content.as_mut().unwrap().bytes
    }

    /// 把缓冲内容同步写入设备。
    pub fn write(&mut self) {
        let (dev, blockno) = (self.dev, self.blockno);
        let payload = self.content.as_mut().unwrap();
        debug_assert!(!payload.disk_owned);
        payload.disk_owned = true;
        let ok = self
            .cache
            .driver
            .write_block(blockno as usize, &payload.bytes);
        payload.disk_owned = false;
        if !ok {
            panic!("bcache: disk write failed (dev={dev}, block={blockno})");
        }
    }

    /// 把缓冲钉在缓存里：引用计数加一，不碰内容锁。
    ///
    /// 句柄释放后缓冲仍不可驱逐，直到配对的
    /// [`BufferCache::unpin`] 被调用。
    pub fn pin(&self) {
        let key = bucket_index(self.dev, self.blockno);
        let mut bucket = self.cache.buckets[key].lock();
        let Some(meta) = bucket.entries.iter_mut().find(|m| m.slot == self.slot) else {
            panic!("bcache: pinned buffer missing from its bucket");
        };
        meta.refcnt += 1;
    }
}

impl Drop for BufGuard<'_> {
    /// 释放缓冲：先放内容锁，再在桶锁下减引用计数。
    ///
    /// 存在一个内容锁已空闲、簿记尚未更新的窗口；持有引用计数的
    /// 槽位绝不会被驱逐，该窗口是无害的。驱逐路径反过来依赖这一
    /// 顺序：引用计数为零蕴含内容锁空闲。
    fn drop(&mut self) {
        drop(self.content.take());

        let key = bucket_index(self.dev, self.blockno);
        let mut bucket = self.cache.buckets[key].lock();
        let Some(meta) = bucket.entries.iter_mut().find(|m| m.slot == self.slot) else {
            panic!("bcache: released buffer missing from its bucket");
        };
        debug_assert!(meta.refcnt > 0, "bcache: release without reference");
        meta.refcnt -= 1;
        if meta.refcnt == 0 {
            meta.lastuse = self.cache.clock.current_tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device::{RamDisk, Ticks};

    #[test]
    fn test_read_write_roundtrip_within_cache() {
        test_support::init_mock_runtime();
        let disk = RamDisk::new(BSIZE * 64, BSIZE, 0);
        let cache = BufferCache::new(disk, Arc::new(Ticks::new()));

        {
            let mut buf = cache.read(0, 9);
            buf.data_mut()[0] = 0xAB;
            buf.data_mut()[BSIZE - 1] = 0xCD;
            buf.write();
        }
        let buf = cache.read(0, 9);
        assert_eq!(buf.data()[0], 0xAB);
        assert_eq!(buf.data()[BSIZE - 1], 0xCD);
        assert_eq!(buf.blockno(), 9);
        assert_eq!(buf.dev(), 0);
    }

    #[test]
    fn test_startup_slots_live_in_bucket_zero() {
        test_support::init_mock_runtime();
        let disk = RamDisk::new(BSIZE * 64, BSIZE, 0);
        let cache = BufferCache::new(disk, Arc::new(Ticks::new()));
        // 未定身份的槽位都在 0 号桶，对外表现为 (0, 0)
        assert_eq!(cache.bucket_of(0, 0), Some(0));
        assert_eq!(cache.bucket_of(0, 1), None);
    }
}
