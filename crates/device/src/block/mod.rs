//! 块设备模块
//!
//! 包含块设备相关的驱动接口和实现

mod ram_disk;

use alloc::{sync::Arc, vec::Vec};
use lazy_static::lazy_static;
use sync::RwLock;

use crate::driver::Driver;

pub use ram_disk::RamDisk;

lazy_static! {
    // NOTE: RwLock 只在初始化阶段有写操作，运行时均为读操作
    /// 全局块设备驱动列表
    pub static ref BLK_DRIVERS: RwLock<Vec<Arc<dyn BlockDriver>>> = RwLock::new(Vec::new());
}

/// 注册块设备驱动
pub fn register_block_driver(driver: Arc<dyn BlockDriver>) {
    log::info!("block driver registered: {}", driver.get_id());
    BLK_DRIVERS.write().push(driver);
}

/// 块设备驱动程序接口
///
/// 读写都是同步的：调用返回即操作完成，没有部分结果，也不可取消。
pub trait BlockDriver: Driver {
    /// 读取块设备数据
    /// # 参数：
    /// * `block_id` - 块设备的块号
    /// * `buf` - 用于存储读取数据的缓冲区
    /// # 返回值：
    /// 如果读取成功则返回 true，否则返回 false
    fn read_block(&self, _block_id: usize, _buf: &mut [u8]) -> bool {
        unimplemented!("not a block driver")
    }

    /// 写入块设备数据
    /// # 参数：
    /// * `block_id` - 块设备的块号
    /// * `buf` - 包含要写入数据的缓冲区
    /// # 返回值：
    /// 如果写入成功则返回 true，否则返回 false
    fn write_block(&self, _block_id: usize, _buf: &[u8]) -> bool {
        unimplemented!("not a block driver")
    }

    /// 刷新到磁盘
    /// # 返回值：
    /// 如果刷新成功则返回 true，否则返回 false
    fn flush(&self) -> bool {
        unimplemented!("not a block driver")
    }

    /// 获取块大小（字节）
    fn block_size(&self) -> usize {
        unimplemented!("not a block driver")
    }

    /// 获取总块数
    fn total_blocks(&self) -> usize {
        unimplemented!("not a block driver")
    }
}
