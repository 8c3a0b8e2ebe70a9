//! 后端注册表
//!
//! 把配置里的 `class` 字符串映射到设备定位函数。
//! 每个设备族一张表（`Backends<dyn Camera>`、`Backends<dyn Mount>` ...）。

use crate::error::HardwareError;
use crate::types::DeviceSpec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 设备定位函数
///
/// - `Ok(Some(device))`：找到并打开设备
/// - `Ok(None)`：设备不存在（未插入、未上电）
/// - `Err(_)`：定位过程中发生错误
pub type Locator<D> =
    Arc<dyn Fn(&DeviceSpec) -> Result<Option<Box<D>>, HardwareError> + Send + Sync>;

/// `class` → 定位函数
pub struct Backends<D: ?Sized> {
    table: BTreeMap<String, Locator<D>>,
}

impl<D: ?Sized> Backends<D> {
    /// 创建空表
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// 注册（或替换）一个后端
    pub fn register(mut self, class: impl Into<String>, locator: Locator<D>) -> Self {
        self.table.insert(class.into(), locator);
        self
    }

    /// 已注册的类型名
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// 定位设备
    ///
    /// # 错误
    /// - `HardwareError::UnknownClass`：`spec.class` 未注册
    /// - 定位函数自身返回的错误
    pub fn locate(&self, spec: &DeviceSpec) -> Result<Option<Box<D>>, HardwareError> {
        let locator = self
            .table
            .get(&spec.class)
            .ok_or_else(|| HardwareError::UnknownClass(spec.class.clone()))?;
        locator(spec)
    }
}

impl<D: ?Sized> Default for Backends<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ?Sized> Clone for Backends<D> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<D: ?Sized> fmt::Debug for Backends<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("classes", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Probe: Send {
        fn id(&self) -> u32;
    }

    struct P(u32);
    impl Probe for P {
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_unknown_class() {
        let backends: Backends<dyn Probe> = Backends::new();
        let result = backends.locate(&DeviceSpec::new("FLI", "x"));
        assert!(matches!(result, Err(HardwareError::UnknownClass(c)) if c == "FLI"));
    }

    #[test]
    fn test_register_and_locate() {
        let backends: Backends<dyn Probe> = Backends::new().register(
            "probe",
            Arc::new(|spec: &DeviceSpec| {
                if spec.serial == "missing" {
                    Ok(None)
                } else {
                    Ok(Some(Box::new(P(7)) as Box<dyn Probe>))
                }
            }),
        );

        let found = backends.locate(&DeviceSpec::new("probe", "a")).unwrap();
        assert_eq!(found.map(|p| p.id()), Some(7));

        let missing = backends.locate(&DeviceSpec::new("probe", "missing")).unwrap();
        assert!(missing.is_none());

        assert_eq!(backends.classes().collect::<Vec<_>>(), vec!["probe"]);
    }
}
