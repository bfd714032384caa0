//! ループアクセラレータ記述子。
//!
//! 2^n の下位桁は n が導入部（lead-in）を過ぎると周期 L で繰り返す。
//! 周期検出ツールは、周期内で下位桁がすべて偶数になりうる位置の一覧を
//! JSON で出力する。探索はその位置だけを調べればよい。
//!
//! ```json
//! { "Mask": 100, "Order": 2, "Length": 20, "Leadin": 2,
//!   "EvenItems": 5, "Gain": 4.0, "Index": [3, 6, 10, 11, 19] }
//! ```
//!
//! 検出ツールの出力には `Cycle` などのフィールドも含まれるが読み飛ばす。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AcceleratorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoopAccelerator {
    /// 周期を調べた法（10^order）
    pub mask: u64,
    /// 法の桁数
    pub order: u32,
    /// 周期長 L
    pub length: u64,
    /// 周期に入るまでの指数
    pub leadin: u64,
    #[serde(default)]
    pub even_items: usize,
    /// 総当たりに対する削減率 L / even_items
    #[serde(default)]
    pub gain: f64,
    /// 候補位置（狭義単調増加、各値 <= L）
    pub index: Vec<u64>,
}

impl LoopAccelerator {
    /// 周期と候補位置から直接構築する（検証付き）
    pub fn from_cycle(order: u32, length: u64, leadin: u64, index: Vec<u64>) -> Result<Self, AcceleratorError> {
        let even_items = index.len();
        let accel = LoopAccelerator {
            mask: 10u64.checked_pow(order).unwrap_or(0),
            order,
            length,
            leadin,
            even_items,
            gain: if even_items > 0 { length as f64 / even_items as f64 } else { 0.0 },
            index,
        };
        accel.validate()?;
        Ok(accel)
    }

    pub fn from_json_str(text: &str) -> Result<Self, AcceleratorError> {
        let accel: LoopAccelerator = serde_json::from_str(text)?;
        accel.validate()?;
        Ok(accel)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AcceleratorError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// 候補位置が空でなく、狭義単調増加で、周期長を超えないことを確認する
    pub fn validate(&self) -> Result<(), AcceleratorError> {
        if self.length == 0 {
            return Err(AcceleratorError::EmptyCycle);
        }
        if self.index.is_empty() {
            return Err(AcceleratorError::NoIndices);
        }
        let mut prev: Option<u64> = None;
        for (position, &index) in self.index.iter().enumerate() {
            if prev.is_some_and(|p| index <= p) {
                return Err(AcceleratorError::NotIncreasing { position, index });
            }
            if index > self.length {
                return Err(AcceleratorError::OutOfCycle { position, index, length: self.length });
            }
            prev = Some(index);
        }
        Ok(())
    }

    /// 候補間の歩幅。先頭は 0 からの差、末尾は次の周期先頭へ戻る歩幅
    pub fn steps(&self) -> Vec<u64> {
        let mut steps = Vec::with_capacity(self.index.len() + 1);
        let mut prev = 0u64;
        for &index in &self.index {
            steps.push(index - prev);
            prev = index;
        }
        steps.push(self.length - prev);
        steps
    }
}
