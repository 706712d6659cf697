//! 脏标记传播模块
//!
//! 每个帧资源槽位都持有一份物体常量的副本。CPU 侧修改一个物体后，
//! 必须把新值依次写入接下来 N 个槽位，所有副本才会一致。
//! 对应 DistEngine 中 RenderItem 的 `NumFramesDirty` 计数。
//!
//! ```text
//! 修改于帧 T（N = 3）
//! T   : 写入 slot[T % 3]      countdown 3 -> 2
//! T+1 : 写入 slot[(T+1) % 3]  countdown 2 -> 1
//! T+2 : 写入 slot[(T+2) % 3]  countdown 1 -> 0
//! T+3 : 跳过
//! ```

use std::collections::BTreeMap;

use crate::core::error::{GraphicsError, Result};

/// 脏标记条目
#[derive(Debug, Clone)]
pub struct DirtyEntry<V> {
    /// 还需要写入的槽位数量
    countdown: usize,
    /// CPU 侧的当前值
    value: V,
}

impl<V> DirtyEntry<V> {
    pub fn countdown(&self) -> usize {
        self.countdown
    }

    pub fn value(&self) -> &V {
        &self.value
    }
}

/// 脏标记传播器
///
/// 按物体 ID 有序遍历，写入顺序在帧与帧之间保持稳定。
#[derive(Debug, Clone)]
pub struct DirtyPropagator<K, V> {
    frame_count: usize,
    entries: BTreeMap<K, DirtyEntry<V>>,
}

impl<K: Ord + Clone, V> DirtyPropagator<K, V> {
    /// 创建传播器，`frame_count` 必须与帧资源池的槽位数量一致
    pub fn new(frame_count: usize) -> Result<Self> {
        if frame_count == 0 {
            return Err(GraphicsError::ResourceCreation(
                "Dirty propagation requires at least one frame resource".to_string(),
            )
            .into());
        }
        Ok(Self {
            frame_count,
            entries: BTreeMap::new(),
        })
    }

    /// 记录新值并把倒计时重置为 N
    ///
    /// 正在进行的倒计时同样会被重置。
    pub fn mark_dirty(&mut self, id: K, value: V) {
        self.entries.insert(
            id,
            DirtyEntry {
                countdown: self.frame_count,
                value,
            },
        );
    }

    /// 值未变但需要重新写入时使用，返回物体是否存在
    pub fn touch(&mut self, id: &K) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.countdown = self.frame_count;
                true
            }
            None => false,
        }
    }

    /// 把所有仍需写入的物体写入 `slot_index` 所在槽位
    ///
    /// 每帧调用一次，传入帧资源池当前交出的槽位。
    /// `writer` 失败时该物体的倒计时不变，错误向上返回。
    /// 返回本次写入的物体数量。
    pub fn tick<W>(&mut self, slot_index: usize, mut writer: W) -> Result<usize>
    where
        W: FnMut(&K, &V, usize) -> Result<()>,
    {
        let mut written = 0;
        for (id, entry) in self.entries.iter_mut() {
            if entry.countdown == 0 {
                continue;
            }
            writer(id, &entry.value, slot_index)?;
            entry.countdown -= 1;
            written += 1;
        }
        Ok(written)
    }

    /// 物体剩余的倒计时，未知物体返回 `None`
    pub fn countdown(&self, id: &K) -> Option<usize> {
        self.entries.get(id).map(DirtyEntry::countdown)
    }

    pub fn get(&self, id: &K) -> Option<&DirtyEntry<V>> {
        self.entries.get(id)
    }

    /// 仍需写入的物体数量
    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|e| e.countdown > 0).count()
    }

    /// 所有槽位的副本是否都已一致
    pub fn is_settled(&self) -> bool {
        self.pending_count() == 0
    }

    /// 移除物体
    pub fn remove(&mut self, id: &K) -> Option<V> {
        self.entries.remove(id).map(|e| e.value)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
