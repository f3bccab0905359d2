/// 聊天命令: `$request <address>`
pub const COMMAND_WORD: &str = "$request";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 不是命令，不回复
    Ignore,
    /// 看起来想用命令但格式不对，回复用法提示
    Usage,
    Request(String),
}

pub fn parse_command(content: &str, account_prefix: &str) -> Command {
    let tokens: Vec<&str> = content.split_whitespace().collect();
    if tokens.len() < 2 {
        return Command::Ignore;
    }

    if tokens[0] == COMMAND_WORD {
        return match tokens.len() {
            2 if tokens[1].starts_with(account_prefix) => Command::Request(tokens[1].to_string()),
            2 => Command::Ignore,
            _ => Command::Usage,
        };
    }

    if tokens.len() == 2 || tokens[1..].contains(&COMMAND_WORD) {
        Command::Usage
    } else {
        Command::Ignore
    }
}
