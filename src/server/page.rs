// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server/page.rs - 上传页面
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

use axum::response::Html;

use super::upload::MediaKind;

/// 处理完成后展示的一对文件
pub struct Shown<'a> {
  pub original: &'a str,
  pub result: &'a str,
  pub kind: MediaKind,
}

pub async fn index() -> Html<String> {
  Html(render(None))
}

pub fn render(shown: Option<&Shown<'_>>) -> String {
  let mut body = String::from(
    r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Object Detection</title>
</head>
<body>
<h1>Object Detection</h1>
<form method="post" enctype="multipart/form-data">
<input type="file" name="file" accept=".png,.jpg,.jpeg,.mp4,.avi">
<input type="submit" value="Upload">
</form>
"#,
  );

  if let Some(shown) = shown {
    body.push_str("<h2>Original</h2>\n");
    body.push_str(&media_tag("input", shown.original, shown.kind));
    body.push_str("<h2>Result</h2>\n");
    body.push_str(&media_tag("output", shown.result, shown.kind));
  }

  body.push_str("</body>\n</html>\n");
  body
}

fn media_tag(dir: &str, name: &str, kind: MediaKind) -> String {
  let src = format!("/{}/{}", dir, urlencoding::encode(name));
  let src = escape_html(&src);
  match kind {
    MediaKind::Image => format!("<img src=\"{}\" alt=\"{}\">\n", src, escape_html(name)),
    MediaKind::Video => format!("<video src=\"{}\" controls></video>\n", src),
  }
}

fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}
