//! A small built-in string table keyed by language and namespaced key.

use crate::config::Language;

/// `(key, english, chinese)`
const STRINGS: &[(&str, &str, &str)] = &[
    ("app.title", "Bulk Flow Renamer", "批量流程重命名"),
    ("dialog.pick_source", "Select a source folder", "选择源文件夹"),
    ("dialog.pick_output", "Select an output folder", "选择输出文件夹"),
    ("error.busy", "Another operation is still running.", "另一个操作仍在进行中。"),
    ("error.not_a_directory", "'{path}' is not a folder.", "“{path}”不是文件夹。"),
    ("error.scan_failed", "Scanning failed: {reason}", "扫描失败：{reason}"),
    (
        "error.limit_exceeded",
        "The source folders contain more than {limit} files. Narrow the selection or raise the limit.",
        "源文件夹包含超过 {limit} 个文件。请缩小范围或提高上限。",
    ),
    ("error.invalid_payload", "Invalid request '{command}': {reason}", "无效请求“{command}”：{reason}"),
    ("error.unknown_step", "The step no longer exists.", "该步骤已不存在。"),
    ("error.unknown_runner", "Runner '{id}' does not exist.", "运行器“{id}”不存在。"),
    ("error.flow", "Flow operation failed: {reason}", "流程操作失败：{reason}"),
    ("error.config_save", "Could not save the settings: {reason}", "无法保存设置：{reason}"),
    ("error.config_blocking", "The settings file cannot be used: {reason}", "无法使用设置文件：{reason}"),
    ("error.open_folder", "Could not open '{path}': {reason}", "无法打开“{path}”：{reason}"),
    ("error.custom_runners", "Could not load user runners: {reason}", "无法加载自定义运行器：{reason}"),
    ("error.nothing_to_apply", "No file reached an output step.", "没有文件到达输出步骤。"),
    (
        "warn.many_files",
        "{count} files found. Previews may be slow above {threshold} files.",
        "找到 {count} 个文件。超过 {threshold} 个文件时预览可能较慢。",
    ),
    ("status.ready", "Ready.", "就绪。"),
    ("status.scanning", "Scanning source folders...", "正在扫描源文件夹..."),
    ("status.scanned", "{count} files loaded.", "已加载 {count} 个文件。"),
    ("status.applying", "Applying...", "正在应用..."),
    ("runner.default", "Pass through", "直接通过"),
    ("runner.filter_contains", "Contains text", "包含文本"),
    ("runner.filter_regex", "Matches pattern", "匹配正则"),
    ("runner.filter_extension", "Extension is", "扩展名为"),
    ("runner.filter_size", "Size between", "大小范围"),
    ("runner.rename_replace", "Replace text", "替换文本"),
    ("runner.rename_regex", "Replace pattern", "正则替换"),
    ("runner.rename_prefix", "Add prefix", "添加前缀"),
    ("runner.rename_suffix", "Add suffix", "添加后缀"),
    ("runner.rename_case", "Change case", "更改大小写"),
    ("runner.rename_extension", "Change extension", "更改扩展名"),
    ("runner.rename_serial", "Number files", "序号"),
    ("runner.rename_dedupe", "Make names unique", "名称去重"),
    ("runner.output_path", "Output to folder", "输出到文件夹"),
    ("param.case_sensitive", "Case sensitive", "区分大小写"),
    ("param.extension", "New extension", "新扩展名"),
    ("param.extensions", "Extensions (comma separated)", "扩展名（逗号分隔）"),
    ("param.find", "Find", "查找"),
    ("param.invert", "Invert", "反选"),
    ("param.max_bytes", "Maximum size (bytes, 0 = none)", "最大大小（字节，0 为不限）"),
    ("param.min_bytes", "Minimum size (bytes)", "最小大小（字节）"),
    ("param.mode", "Mode", "模式"),
    ("param.output_path", "Output folder", "输出文件夹"),
    ("param.pattern", "Pattern", "正则表达式"),
    ("param.position", "Position", "位置"),
    ("param.replace", "Replace with", "替换为"),
    ("param.separator", "Separator", "分隔符"),
    ("param.start", "Start at", "起始值"),
    ("param.step", "Increment", "增量"),
    ("param.target", "Match against", "匹配对象"),
    ("param.text", "Text", "文本"),
    ("param.width", "Digits", "位数"),
];

/// Looks up `key`. Unknown keys are returned unchanged so literal labels pass through.
pub fn tr(language: Language, key: &str) -> String {
    STRINGS
        .iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, en, zh)| match language {
            Language::En => *en,
            Language::Zh => *zh,
        })
        .unwrap_or(key)
        .to_string()
}

/// Like [`tr`], substituting `{name}` placeholders.
pub fn tr_with(language: Language, key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(tr(language, key), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), value)
    })
}
