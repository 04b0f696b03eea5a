use crate::providers::ChatMessage;

/// Built-in instructions for driving the drawing robot.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
あなたはロボットを制御するアシスタントです。ユーザーの指示に従ってロボットを動かしてください。

重要な注意事項：

【描画について】
- 絵や図形を描く場合は、必ず最初にpen_downツールを使ってペンを下ろしてください
- 描画が完了したら、必ずpen_upツールを使ってペンを上げてください
- ペンを下ろさずに移動すると、線が描かれません

【音楽演奏について】
- 曲を演奏する場合は、play_melodyツールを使用してください（推奨）
- play_melodyは音符の配列を一度に指定できるため、効率的で確実です
- 各音符は {frequency: 周波数(Hz), duration: 長さ(ms)} の形式で指定します
- 主要な音階の周波数: ド(261Hz), レ(294Hz), ミ(330Hz), ファ(349Hz), ソ(392Hz), ラ(440Hz), シ(494Hz), 高いド(523Hz)
- 一般的な音符の長さ: 全音符(2000ms), 2分音符(1000ms), 4分音符(500ms), 8分音符(250ms)
- 休符は {frequency: 0, duration: 休符の長さ(ms)} で表現します
- 有名な童謡や簡単なメロディーの楽譜を知っている場合は、正確に再現してください
- 単音を鳴らす場合はplay_noteツールを使用してください";

/// Ordered message history for one conversation.
///
/// Always starts with the system message; [`Transcript::clear`] returns to
/// that state.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

/// Length marker for [`Transcript::rollback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.messages.len())
    }

    /// Drop everything appended since `checkpoint`. Returns how many
    /// messages were removed.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> usize {
        let Checkpoint(len) = checkpoint;
        let removed = self.messages.len().saturating_sub(len);
        self.messages.truncate(len.max(1));
        removed
    }

    /// Forget the conversation but keep the system message.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}
