// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/labels.rs - 类别名称表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::borrow::Cow;
use std::collections::BTreeMap;

/// 缺少模型元数据时生成的占位类别数量
pub const PLACEHOLDER_CLASS_COUNT: u32 = 1000;

/// 类别编号到可读名称的映射，进程启动时加载，之后只读
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
  names: BTreeMap<u32, String>,
}

impl ClassNames {
  /// 占位名称表：`class_0` .. `class_999`
  pub fn placeholder() -> Self {
    let names = (0..PLACEHOLDER_CLASS_COUNT)
      .map(|id| (id, placeholder_label(id)))
      .collect();
    Self { names }
  }

  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names = names
      .into_iter()
      .enumerate()
      .map(|(id, name)| (id as u32, name.into()))
      .collect();
    Self { names }
  }

  /// 解析 YOLO 导出模型元数据中的 `names` 字段，
  /// 形如 `{0: 'person', 1: 'bicycle'}`
  pub fn from_metadata(metadata: &str) -> Option<Self> {
    let body = metadata.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut names = BTreeMap::new();
    let mut rest = body.trim_start();

    while !rest.is_empty() {
      let (key, after_key) = rest.split_once(':')?;
      let id = key.trim().parse::<u32>().ok()?;

      let after_key = after_key.trim_start();
      let quote = after_key.chars().next().filter(|c| *c == '\'' || *c == '"')?;
      let value_start = &after_key[quote.len_utf8()..];
      let value_end = value_start.find(quote)?;
      names.insert(id, value_start[..value_end].to_string());

      rest = value_start[value_end + quote.len_utf8()..].trim_start();
      rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    if names.is_empty() { None } else { Some(Self { names }) }
  }

  /// 类别标签，未知编号返回占位名称
  pub fn label(&self, class_id: u32) -> Cow<'_, str> {
    match self.names.get(&class_id) {
      Some(name) => Cow::Borrowed(name.as_str()),
      None => Cow::Owned(placeholder_label(class_id)),
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl Default for ClassNames {
  fn default() -> Self {
    Self::placeholder()
  }
}

fn placeholder_label(class_id: u32) -> String {
  format!("class_{}", class_id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_yolo_metadata() {
    let names = ClassNames::from_metadata("{0: 'person', 1: 'bicycle', 15: 'cat', 9: 'traffic light'}")
      .expect("names");
    assert_eq!(names.len(), 4);
    assert_eq!(names.label(0), "person");
    assert_eq!(names.label(15), "cat");
    assert_eq!(names.label(9), "traffic light");
  }

  #[test]
  fn parses_double_quoted_values() {
    let names = ClassNames::from_metadata(r#"{0: "it's", 1: 'b'}"#).expect("names");
    assert_eq!(names.label(0), "it's");
    assert_eq!(names.label(1), "b");
  }

  #[test]
  fn rejects_malformed_metadata() {
    assert_eq!(ClassNames::from_metadata(""), None);
    assert_eq!(ClassNames::from_metadata("{}"), None);
    assert_eq!(ClassNames::from_metadata("[person, bicycle]"), None);
    assert_eq!(ClassNames::from_metadata("{a: 'person'}"), None);
    assert_eq!(ClassNames::from_metadata("{0: 'person}"), None);
  }

  #[test]
  fn placeholder_covers_thousand_classes() {
    let names = ClassNames::placeholder();
    assert_eq!(names.len(), 1000);
    assert_eq!(names.label(0), "class_0");
    assert_eq!(names.label(999), "class_999");
  }

  #[test]
  fn unknown_id_falls_back_to_placeholder() {
    let names = ClassNames::from_names(["person"]);
    assert_eq!(names.label(0), "person");
    assert_eq!(names.label(4242), "class_4242");
  }
}
