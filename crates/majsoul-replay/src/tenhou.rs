//! Conversion of a decoded transcript into tenhou.net/6 JSON.
//!
//! tenhou.net/6 is the log format most third-party viewers and analysers
//! read. One log holds a header plus one array per round:
//!
//! ```text
//! [[kyoku, honba, sticks], [scores], [dora], [ura],
//!  haipai0, draws0, discards0, … haipai3, draws3, discards3,
//!  [result]]
//! ```
//!
//! Tiles are two-digit numbers: suit (1 man, 2 pin, 3 sou, 4 honor) times
//! ten plus rank, with 51/52/53 for the red fives. Calls are strings that
//! mark the called tile and, by where the marker sits, who it came from.

use majsoul_protocol::rank::{room_label, PlayerLevel};
use serde_json::{json, Value};

use crate::record::{
    Action, HuleInfo, RecordAnGangAddGang, RecordChiPengGang, RecordGame, RecordHule,
    RecordLiuJu, RecordNewRound, RecordNoTile,
};
use crate::ReplayError;

/// Discard marker for a tile thrown straight from the draw.
const TSUMOGIRI: u32 = 60;

const TABLE_SEATS: usize = 4;

const CHI: u32 = 0;
const PON: u32 = 1;
const ADDED_KAN: u32 = 2;

const ABORTIVE_DRAWS: [&str; 5] = ["九種九牌", "四風連打", "四槓散了", "四家立直", "三家和了"];

/// Converts a record header and its transcript into a tenhou.net/6 log.
pub fn to_tenhou(head: &RecordGame, actions: &[Action]) -> Result<Value, ReplayError> {
    let players = head.player_count();
    let mut rounds = Vec::new();
    let mut round: Option<Round> = None;

    for action in actions {
        match action {
            Action::NewRound(r) => {
                if round.is_some() {
                    tracing::warn!("round without a result, dropping it");
                }
                round = Some(Round::start(r, players)?);
            }
            Action::Other(name) => tracing::trace!(record = %name, "skipped"),
            action => {
                let Some(current) = round.as_mut() else {
                    tracing::warn!(?action, "action outside of a round");
                    continue;
                };
                if let Some(result) = current.apply(action, players)? {
                    if let Some(finished) = round.take() {
                        rounds.push(finished.finish(result));
                    }
                }
            }
        }
    }

    Ok(json!({
        "title": [title(head), format_timestamp(head.start_time)],
        "name": names(head),
        "rule": rule(head, players),
        "ratingc": if players == 3 { "PF3" } else { "PF4" },
        "lobby": 0,
        "dan": dan(head, players),
        "rate": vec![1500.0; TABLE_SEATS],
        "sx": vec!["C"; TABLE_SEATS],
        "sc": final_scores(head),
        "log": rounds,
        "ref": head.uuid,
    }))
}

/// Parses a majsoul tile (`5m`, `0p`, `7z`) into its tenhou number.
pub fn tile_code(tile: &str) -> Result<u32, ReplayError> {
    let bad = || ReplayError::BadTile(tile.to_string());
    let mut chars = tile.chars();
    let (Some(rank), Some(suit), None) = (
        chars.next().and_then(|c| c.to_digit(10)),
        chars.next(),
        chars.next(),
    ) else {
        return Err(bad());
    };
    let suit = match suit {
        'm' => 1,
        'p' => 2,
        's' => 3,
        'z' => 4,
        _ => return Err(bad()),
    };
    match (rank, suit) {
        (0, 4) => Err(bad()),
        (0, s) => Ok(50 + s),
        (r, s) => Ok(s * 10 + r),
    }
}

/// The red five as its plain five; every other tile unchanged.
fn plain(code: u32) -> u32 {
    if code > 50 { (code - 50) * 10 + 5 } else { code }
}

fn codes(tiles: &[String]) -> Result<Vec<u32>, ReplayError> {
    tiles.iter().map(|t| tile_code(t)).collect()
}

/// Where a caller's source sits relative to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Left,
    Across,
    Right,
}

fn relative(from: u32, seat: u32, players: usize) -> Source {
    let n = players as u32;
    match (from % n + n - seat % n) % n {
        1 => Source::Right,
        d if d == n - 1 => Source::Left,
        _ => Source::Across,
    }
}

/// Builds a meld string: marker before the called tile, own tiles placed
/// so the marker's position names the source seat.
fn meld(marker: char, called: u32, own: &[u32], from: Source) -> String {
    let called = format!("{marker}{called}");
    let mut parts: Vec<String> = own.iter().map(u32::to_string).collect();
    let at = match from {
        Source::Left => 0,
        Source::Across => 1.min(parts.len()),
        Source::Right => parts.len(),
    };
    parts.insert(at, called);
    parts.concat()
}

struct Round {
    header: [u32; 3],
    scores: Vec<i32>,
    doras: Vec<u32>,
    uras: Vec<u32>,
    haipai: [Vec<u32>; TABLE_SEATS],
    draws: [Vec<Value>; TABLE_SEATS],
    discards: [Vec<Value>; TABLE_SEATS],
    /// Seat of the last discard or added kan, the source of a ron.
    last_actor: u32,
}

impl Round {
    fn start(r: &RecordNewRound, players: usize) -> Result<Self, ReplayError> {
        let mut haipai: [Vec<u32>; TABLE_SEATS] = Default::default();
        let mut draws: [Vec<Value>; TABLE_SEATS] = Default::default();
        for (seat, hand) in haipai.iter_mut().enumerate().take(players) {
            *hand = codes(r.hand(seat))?;
        }

        // The dealer is dealt fourteen; tenhou counts the last as a draw.
        let dealer = r.ju as usize % players;
        if haipai[dealer].len() > 13 {
            let extra = haipai[dealer].split_off(13);
            draws[dealer].extend(extra.into_iter().map(Value::from));
        }

        let mut scores = r.scores.clone();
        scores.resize(TABLE_SEATS, 0);

        Ok(Self {
            header: [r.chang * 4 + r.ju, r.ben, r.liqibang],
            scores,
            doras: codes(&r.dora_indicators())?,
            uras: Vec::new(),
            haipai,
            draws,
            discards: Default::default(),
            last_actor: r.ju,
        })
    }

    fn reveal(&mut self, doras: &[String]) -> Result<(), ReplayError> {
        if !doras.is_empty() {
            self.doras = codes(doras)?;
        }
        Ok(())
    }

    /// Applies one action; returns the round result once it ends.
    fn apply(&mut self, action: &Action, players: usize) -> Result<Option<Value>, ReplayError> {
        match action {
            Action::DealTile(d) => {
                self.reveal(&d.doras)?;
                at_seat(&mut self.draws, d.seat)?.push(tile_code(&d.tile)?.into());
            }
            Action::DiscardTile(d) => {
                self.reveal(&d.doras)?;
                let code = if d.moqie { TSUMOGIRI } else { tile_code(&d.tile)? };
                let entry = if d.is_liqi || d.is_wliqi {
                    Value::from(format!("r{code}"))
                } else {
                    Value::from(code)
                };
                at_seat(&mut self.discards, d.seat)?.push(entry);
                self.last_actor = d.seat;
            }
            Action::ChiPengGang(c) => self.call(c, players)?,
            Action::AnGangAddGang(k) => {
                self.kan(k)?;
                self.reveal(&k.doras)?;
                self.last_actor = k.seat;
            }
            Action::BaBei(b) => {
                self.reveal(&b.doras)?;
                at_seat(&mut self.discards, b.seat)?.push("f44".into());
            }
            Action::Hule(h) => return self.hule(h).map(Some),
            Action::NoTile(n) => return Ok(Some(no_tile(n, players))),
            Action::LiuJu(l) => return Ok(Some(abortive(l))),
            Action::NewRound(_) | Action::Other(_) => {}
        }
        Ok(None)
    }

    fn call(&mut self, c: &RecordChiPengGang, players: usize) -> Result<(), ReplayError> {
        let tiles = codes(&c.tiles)?;
        let called_at = c.froms.iter().position(|&f| f != c.seat);
        let Some(called_at) = called_at.filter(|&i| i < tiles.len()) else {
            tracing::warn!(seat = c.seat, "call without a called tile, skipped");
            return Ok(());
        };
        let called = tiles[called_at];
        let own: Vec<u32> = tiles
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != called_at)
            .map(|(_, &t)| t)
            .collect();
        let from = relative(c.froms[called_at], c.seat, players);

        let entry = match c.kind {
            CHI => format!("c{called}{}", own.iter().map(u32::to_string).collect::<String>()),
            PON => meld('p', called, &own, from),
            _ => {
                // Open kan: the discard slot holds a placeholder.
                at_seat(&mut self.discards, c.seat)?.push(0.into());
                meld('m', called, &own, from)
            }
        };
        at_seat(&mut self.draws, c.seat)?.push(entry.into());
        Ok(())
    }

    fn kan(&mut self, k: &RecordAnGangAddGang) -> Result<(), ReplayError> {
        let tile = tile_code(&k.tiles)?;
        let seat = k.seat;

        let entry = if k.kind == ADDED_KAN {
            let pon = at_seat(&mut self.draws, seat)?.iter().rev().find_map(|d| {
                let s = d.as_str()?;
                let at = s.find('p')?;
                let called: u32 = s.get(at + 1..at + 3)?.parse().ok()?;
                (plain(called) == plain(tile)).then(|| s.to_string())
            });
            match pon {
                Some(pon) => pon.replacen('p', &format!("k{tile}"), 1),
                None => {
                    tracing::warn!(seat, tile, "added kan without a matching pon");
                    format!("k{tile}{tile}{tile}{tile}")
                }
            }
        } else {
            let base = plain(tile);
            format!("{base}{base}{base}a{tile}")
        };
        at_seat(&mut self.discards, seat)?.push(entry.into());
        Ok(())
    }

    fn hule(&mut self, h: &RecordHule) -> Result<Value, ReplayError> {
        let mut result = vec![Value::from("和了")];
        for (i, win) in h.hules.iter().enumerate() {
            if win.liqi && self.uras.is_empty() {
                self.uras = codes(&win.li_doras)?;
            }
            // Double ron: the combined delta is reported with the first winner.
            let delta = if i == 0 {
                padded(&h.delta_scores)
            } else {
                vec![0; TABLE_SEATS]
            };
            let from = if win.zimo { win.seat } else { self.last_actor };
            let liable = win.baopai.checked_sub(1).unwrap_or(win.seat);

            let mut detail = vec![
                Value::from(win.seat),
                Value::from(from),
                Value::from(liable),
                Value::from(points_text(win)),
            ];
            detail.extend(yaku_texts(win).into_iter().map(Value::from));

            result.push(delta.into());
            result.push(detail.into());
        }
        Ok(result.into())
    }

    fn finish(self, result: Value) -> Value {
        let mut out = vec![
            json!(self.header),
            json!(self.scores),
            json!(self.doras),
            json!(self.uras),
        ];
        for ((haipai, draws), discards) in self.haipai.into_iter().zip(self.draws).zip(self.discards)
        {
            out.push(json!(haipai));
            out.push(draws.into());
            out.push(discards.into());
        }
        out.push(result);
        out.into()
    }
}

fn at_seat(
    columns: &mut [Vec<Value>; TABLE_SEATS],
    seat: u32,
) -> Result<&mut Vec<Value>, ReplayError> {
    columns
        .get_mut(seat as usize)
        .ok_or(ReplayError::BadSeat(seat))
}

fn padded(scores: &[i32]) -> Vec<i32> {
    let mut out = scores.to_vec();
    out.resize(TABLE_SEATS, 0);
    out
}

fn no_tile(n: &RecordNoTile, players: usize) -> Value {
    let label = if n.liujumanguan { "流し満貫" } else { "流局" };
    let mut delta = vec![0; TABLE_SEATS];
    for score in &n.scores {
        for (total, d) in delta.iter_mut().zip(&score.delta_scores).take(players) {
            *total += d;
        }
    }
    json!([label, delta])
}

fn abortive(l: &RecordLiuJu) -> Value {
    let label = (l.kind as usize)
        .checked_sub(1)
        .and_then(|i| ABORTIVE_DRAWS.get(i))
        .copied()
        .unwrap_or("流局");
    json!([label])
}

fn limit_name(win: &HuleInfo) -> Option<&'static str> {
    let (han, fu) = (win.count, win.fu);
    Some(match han {
        _ if win.yiman || han >= 13 => "役満",
        11..=12 => "三倍満",
        8..=10 => "倍満",
        6..=7 => "跳満",
        5 => "満貫",
        4 if fu >= 40 => "満貫",
        3 if fu >= 70 => "満貫",
        _ => return None,
    })
}

fn points_text(win: &HuleInfo) -> String {
    let label = match limit_name(win) {
        Some(name) => name.to_string(),
        None => format!("{}符{}飜", win.fu, win.count),
    };
    let points = match (win.zimo, win.qinjia) {
        (false, _) => format!("{}点", win.point_rong),
        (true, true) => format!("{}点∀", win.point_zimo_xian),
        (true, false) => format!("{}-{}点", win.point_zimo_xian, win.point_zimo_qin),
    };
    format!("{label}{points}")
}

fn yaku_texts(win: &HuleInfo) -> Vec<String> {
    win.fans
        .iter()
        .filter(|f| win.yiman || f.val > 0)
        .map(|f| {
            let name = yaku_name(f.id).unwrap_or(&f.name);
            if win.yiman {
                format!("{name}(役満)")
            } else {
                format!("{name}({}飜)", f.val)
            }
        })
        .collect()
}

/// tenhou's name for a majsoul fan id.
fn yaku_name(id: u32) -> Option<&'static str> {
    Some(match id {
        1 => "門前清自摸和",
        2 => "立直",
        3 => "槍槓",
        4 => "嶺上開花",
        5 => "海底摸月",
        6 => "河底撈魚",
        7 => "役牌 白",
        8 => "役牌 發",
        9 => "役牌 中",
        10 => "自風 東",
        11 => "場風 東",
        12 => "断幺九",
        13 => "一盃口",
        14 => "平和",
        15 => "混全帯幺九",
        16 => "一気通貫",
        17 => "三色同順",
        18 => "両立直",
        19 => "三色同刻",
        20 => "三槓子",
        21 => "対々和",
        22 => "三暗刻",
        23 => "小三元",
        24 => "混老頭",
        25 => "七対子",
        26 => "純全帯幺九",
        27 => "混一色",
        28 => "二盃口",
        29 => "清一色",
        30 => "一発",
        31 => "ドラ",
        32 => "赤ドラ",
        33 => "裏ドラ",
        34 => "抜きドラ",
        35 => "天和",
        36 => "地和",
        37 => "大三元",
        38 => "四暗刻",
        39 => "字一色",
        40 => "緑一色",
        41 => "清老頭",
        42 => "国士無双",
        43 => "小四喜",
        44 => "四槓子",
        45 => "九蓮宝燈",
        46 => "八連荘",
        47 => "純正九蓮宝燈",
        48 => "四暗刻単騎",
        49 => "国士無双１３面",
        50 => "大四喜",
        _ => return None,
    })
}

fn title(head: &RecordGame) -> &'static str {
    room_label(head.config.meta.mode_id).unwrap_or("")
}

fn names(head: &RecordGame) -> Vec<String> {
    let mut names = vec![String::new(); TABLE_SEATS];
    for slot in names.iter_mut().take(head.player_count()) {
        *slot = "AI".to_string();
    }
    for account in &head.accounts {
        if let Some(slot) = names.get_mut(account.seat as usize) {
            slot.clone_from(&account.nickname);
        }
    }
    names
}

fn dan(head: &RecordGame, players: usize) -> Vec<String> {
    let mut dan = vec![String::new(); TABLE_SEATS];
    for account in &head.accounts {
        let level = if players == 3 {
            account.level3
        } else {
            account.level
        };
        if let Some(slot) = dan.get_mut(account.seat as usize) {
            *slot = PlayerLevel::new(level.id, level.score).tag();
        }
    }
    dan
}

fn rule(head: &RecordGame, players: usize) -> Value {
    let disp = room_label(head.config.meta.mode_id).unwrap_or("Friendly");
    if players == 3 {
        json!({"disp": disp, "aka52": 1, "aka53": 1})
    } else {
        json!({"disp": disp, "aka51": 1, "aka52": 1, "aka53": 1})
    }
}

/// `[points, uma]` per seat, uma in thousands.
fn final_scores(head: &RecordGame) -> Vec<Value> {
    let mut players = head.result.players.clone();
    players.sort_by_key(|p| p.seat);
    players
        .iter()
        .flat_map(|p| [json!(p.part_point_1), json!(f64::from(p.total_point) / 1000.0)])
        .collect()
}

/// `YYYY/MM/DD HH:MM:SS` in UTC.
fn format_timestamp(secs: u32) -> String {
    let secs = i64::from(secs);
    let (days, rem) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    let (y, m, d) = civil_from_days(days);
    format!(
        "{y:04}/{m:02}/{d:02} {:02}:{:02}:{:02}",
        rem / 3600,
        rem % 3600 / 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}
