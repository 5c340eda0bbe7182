//! 季号中文数字化
//! `an2cn` 只做小写 ("low") 风格，支持到 9999 万

use crate::types::MediaInfo;

const DIGITS: [char; 10] = ['零', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const UNITS: [&str; 4] = ["", "十", "百", "千"];
const MAX: u64 = 9999_9999;

/// 阿拉伯数字转中文小写数字，超出范围返回 None
pub fn an2cn(n: u64) -> Option<String> {
    if n > MAX {
        return None;
    }
    if n == 0 {
        return Some(DIGITS[0].to_string());
    }

    let high = n / 1_0000;
    let low = n % 1_0000;
    let mut out = String::new();

    if high > 0 {
        push_section(high, &mut out);
        out.push('万');
        if low > 0 && low < 1000 {
            out.push('零');
        }
    }
    if low > 0 {
        push_section(low, &mut out);
    }

    // 一十 开头读作 十
    if let Some(rest) = out.strip_prefix("一十") {
        out = format!("十{}", rest);
    }
    Some(out)
}

/// 0 < n < 10000
fn push_section(n: u64, out: &mut String) {
    let mut started = false;
    let mut pending_zero = false;
    for pos in (0..4).rev() {
        let digit = (n / 10u64.pow(pos as u32) % 10) as usize;
        if digit == 0 {
            if started {
                pending_zero = true;
            }
            continue;
        }
        if pending_zero {
            out.push(DIGITS[0]);
            pending_zero = false;
        }
        out.push(DIGITS[digit]);
        out.push_str(UNITS[pos]);
        started = true;
    }
}

/// 季号文本，0 视为无季号
pub fn season_text(season: u32) -> Option<String> {
    if season == 0 {
        return None;
    }
    an2cn(season as u64)
}

/// 为电视剧结果追加 "第X季" 并记录季号
/// 数字转换失败时只记录季号，不改标题
pub fn apply_season(medias: &mut [MediaInfo], begin_season: Option<u32>) {
    let season = match begin_season {
        Some(s) if s > 0 => s,
        _ => return,
    };
    if medias.is_empty() {
        return;
    }

    let season_str = season_text(season);
    for media in medias.iter_mut().filter(|m| m.is_tv()) {
        if let Some(text) = &season_str {
            media.title = format!("{} 第{}季", media.title, text);
        }
        media.season = Some(season);
    }
}
