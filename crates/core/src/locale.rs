use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::error::SuiteError;

/// Language used for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        }
    }

    /// Looks up a message; unknown keys are returned unchanged.
    pub fn message<'a>(&self, key: &'a str) -> &'a str {
        match self {
            Locale::En => english(key),
            Locale::Zh => chinese(key),
        }
        .unwrap_or(key)
    }

    /// Message shown for an error. Never includes the transport's own text.
    pub fn describe(&self, error: &SuiteError) -> &'static str {
        self.message(error.message_key())
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("unsupported locale '{raw}'"))]
pub struct UnsupportedLocale {
    raw: String,
}

impl FromStr for Locale {
    type Err = UnsupportedLocale;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Locale::En),
            "zh" | "chinese" | "中文" => Ok(Locale::Zh),
            other => UnsupportedLocaleSnafu { raw: other }.fail(),
        }
    }
}

impl TryFrom<String> for Locale {
    type Error = UnsupportedLocale;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

fn english(key: &str) -> Option<&'static str> {
    let message = match key {
        "error_generate_text_stream" => "Failed to generate text stream. Please try again.",
        "error_generate_image" => "Failed to generate image. Please try again.",
        "error_edit_image" => "Failed to edit image. Please try again.",
        "error_no_image_generated" => "No image was generated.",
        "error_no_edited_image" => "No edited image was returned.",
        "error_upload_first" => "Please upload an image first.",
        "error_empty_input" => "Please enter a prompt first.",
        "error_history_index" => "That version does not exist.",
        "error_session_busy" => "Please wait for the current reply to finish.",
        "error_session_closed" => "This conversation has been closed.",
        "chatbot_initial_message" => "Hello! How can I help you today?",
        "image_editor_upload_prompt" => "Upload an image to start",
        "error_missing_api_key" => "No API key configured. Set GEMINI_API_KEY or add api_key to settings.json.",
        "error_read_file" => "Could not read that file.",
        "error_write_file" => "Could not write that file.",
        "error_nothing_to_save" => "There is no image to save yet.",
        "error_unknown_command" => "Unknown command. Type /help for the list.",
        "error_invalid_argument" => "That value is not valid for this command.",
        "shell_sources" => "Sources:",
        "shell_image_ready" => "Image ready:",
        "shell_version" => "Version",
        "shell_saved" => "Saved.",
        "shell_conversation_reset" => "Started a new conversation.",
        "shell_editor_cleared" => "Editor cleared.",
        "shell_help" => "Type a message to chat, or use /image <prompt>, /ratio <1:1|16:9|9:16|4:3|3:4>, /load <path>, /adopt, /edit <prompt>, /select <n>, /history, /save <path>, /clear, /reset, /lang <en|zh>, /quit.",
        _ => return None,
    };
    Some(message)
}

fn chinese(key: &str) -> Option<&'static str> {
    let message = match key {
        "error_generate_text_stream" => "生成文本流失败。请重试。",
        "error_generate_image" => "生成图像失败。请重试。",
        "error_edit_image" => "编辑图像失败。请重试。",
        "error_no_image_generated" => "没有生成图像。",
        "error_no_edited_image" => "没有返回编辑过的图像。",
        "error_upload_first" => "请先上传一张图片。",
        "error_empty_input" => "请先输入内容。",
        "error_history_index" => "该版本不存在。",
        "error_session_busy" => "请等待当前回复完成。",
        "error_session_closed" => "此对话已关闭。",
        "chatbot_initial_message" => "你好！今天我能为您做些什么？",
        "image_editor_upload_prompt" => "上传图像以开始",
        "error_missing_api_key" => "未配置 API 密钥。请设置 GEMINI_API_KEY 或在 settings.json 中添加 api_key。",
        "error_read_file" => "无法读取该文件。",
        "error_write_file" => "无法写入该文件。",
        "error_nothing_to_save" => "还没有可以保存的图像。",
        "error_unknown_command" => "未知命令。输入 /help 查看列表。",
        "error_invalid_argument" => "该值对此命令无效。",
        "shell_sources" => "来源：",
        "shell_image_ready" => "图像已生成：",
        "shell_version" => "版本",
        "shell_saved" => "已保存。",
        "shell_conversation_reset" => "已开始新的对话。",
        "shell_editor_cleared" => "编辑器已清空。",
        "shell_help" => "输入消息即可聊天，或使用 /image <提示>、/ratio <1:1|16:9|9:16|4:3|3:4>、/load <路径>、/adopt、/edit <提示>、/select <n>、/history、/save <路径>、/clear、/reset、/lang <en|zh>、/quit。",
        _ => return None,
    };
    Some(message)
}
