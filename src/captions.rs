use eyre::{Result, bail};
use log::{debug, warn};
use serde::Deserialize;

use crate::metadata::{USER_AGENT, player_response};
use crate::{Segment, Transcript, TranscriptSource};

/// Translation target when no preference is given.
const FALLBACK_LANG: &str = "en";

/// Outcome of caption extraction. `NoCaptions` is a legitimate empty
/// result, not an error: it routes the run to the audio fallback.
#[derive(Debug)]
pub enum CaptionOutcome {
    Found(Transcript),
    NoCaptions,
}

#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub base_url: String,
    pub language_code: String,
    pub is_translatable: bool,
}

/// Caption tracks split by origin: human-authored vs auto-generated (ASR).
#[derive(Debug, Default)]
pub struct TrackList {
    pub manual: Vec<TrackInfo>,
    pub generated: Vec<TrackInfo>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<RawTrack>>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    kind: Option<String>,
    #[serde(rename = "isTranslatable")]
    is_translatable: Option<bool>,
}

/// Retrieve captions for a video, preferring human-authored tracks in the
/// given language order.
///
/// Priority: manual track in a preferred language; then an auto-generated
/// track in a preferred language, falling back to machine translation when
/// the platform refuses the direct fetch; then any auto track that serves.
/// Every failure along the way is absorbed — the worst case is
/// [`CaptionOutcome::NoCaptions`], which selects the audio path.
pub async fn fetch_captions(
    client: &reqwest::Client,
    video_id: &str,
    preferred: &[String],
) -> CaptionOutcome {
    let hl = preferred.first().map(String::as_str).unwrap_or(FALLBACK_LANG);
    let player = match player_response(client, video_id, hl).await {
        Ok(p) => p,
        Err(e) => {
            warn!("caption track listing failed for {video_id}: {e}");
            return CaptionOutcome::NoCaptions;
        }
    };

    let tracks = parse_track_list(&player);
    debug!(
        "{video_id}: {} manual, {} auto caption tracks",
        tracks.manual.len(),
        tracks.generated.len()
    );

    match select_and_fetch(client, video_id, &tracks, preferred).await {
        Some(transcript) => CaptionOutcome::Found(transcript),
        None => CaptionOutcome::NoCaptions,
    }
}

fn parse_track_list(player: &serde_json::Value) -> TrackList {
    let data: Option<CaptionsData> = player
        .get("captions")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok());

    let raw = data
        .and_then(|c| c.renderer)
        .and_then(|r| r.caption_tracks)
        .unwrap_or_default();

    let mut list = TrackList::default();
    for t in raw {
        let is_generated = t.kind.as_deref() == Some("asr");
        let info = TrackInfo {
            // srv3 payloads use a different schema than the timedtext XML
            base_url: t.base_url.replace("&fmt=srv3", ""),
            language_code: t.language_code,
            is_translatable: t.is_translatable.unwrap_or(false),
        };
        if is_generated {
            list.generated.push(info);
        } else {
            list.manual.push(info);
        }
    }
    list
}

fn find_track<'a>(tracks: &'a [TrackInfo], lang: &str) -> Option<&'a TrackInfo> {
    tracks
        .iter()
        .find(|t| t.language_code == lang)
        .or_else(|| {
            let prefix = format!("{lang}-");
            tracks.iter().find(|t| t.language_code.starts_with(&prefix))
        })
}

async fn select_and_fetch(
    client: &reqwest::Client,
    video_id: &str,
    tracks: &TrackList,
    preferred: &[String],
) -> Option<Transcript> {
    // 1. Manual track in preference order
    for lang in preferred {
        if let Some(track) = find_track(&tracks.manual, lang) {
            match fetch_track(client, track, None).await {
                Ok(segments) => {
                    debug!("using manual caption track: {}", track.language_code);
                    return Some(make_transcript(video_id, &track.language_code, segments));
                }
                Err(e) => warn!("manual track {} fetch failed: {e}", track.language_code),
            }
        }
    }

    // 2. Auto-generated track in preference order
    if let Some(track) = preferred.iter().find_map(|l| find_track(&tracks.generated, l)) {
        match fetch_track(client, track, None).await {
            Ok(segments) => {
                debug!("using auto caption track: {}", track.language_code);
                return Some(make_transcript(video_id, &track.language_code, segments));
            }
            Err(e) => warn!("auto track {} direct fetch failed: {e}", track.language_code),
        }

        // The platform serves some auto tracks only through translation.
        let target = preferred.first().map(String::as_str).unwrap_or(FALLBACK_LANG);
        if track.is_translatable {
            match fetch_track(client, track, Some(target)).await {
                Ok(segments) => {
                    debug!("using auto track {} translated to {target}", track.language_code);
                    return Some(make_transcript(video_id, target, segments));
                }
                Err(e) => warn!("translation to {target} failed: {e}"),
            }
            if target != FALLBACK_LANG {
                match fetch_track(client, track, Some(FALLBACK_LANG)).await {
                    Ok(segments) => {
                        debug!("using auto track {} translated to {FALLBACK_LANG}", track.language_code);
                        return Some(make_transcript(video_id, FALLBACK_LANG, segments));
                    }
                    Err(e) => warn!("translation to {FALLBACK_LANG} failed: {e}"),
                }
            }
        }

        // Last resort within this branch: any other auto track that serves
        for other in &tracks.generated {
            if other.language_code == track.language_code {
                continue;
            }
            match fetch_track(client, other, None).await {
                Ok(segments) => {
                    debug!("using auto caption track: {}", other.language_code);
                    return Some(make_transcript(video_id, &other.language_code, segments));
                }
                Err(e) => warn!("auto track {} fetch failed: {e}", other.language_code),
            }
        }
        return None;
    }

    // 3. Any auto track in any language
    for track in &tracks.generated {
        match fetch_track(client, track, None).await {
            Ok(segments) => {
                debug!("using auto caption track: {}", track.language_code);
                return Some(make_transcript(video_id, &track.language_code, segments));
            }
            Err(e) => warn!("auto track {} fetch failed: {e}", track.language_code),
        }
    }

    None
}

fn make_transcript(video_id: &str, language: &str, segments: Vec<Segment>) -> Transcript {
    Transcript {
        video_id: video_id.to_string(),
        language: language.to_string(),
        source: TranscriptSource::Caption,
        segments,
    }
}

/// Fetch one caption track, optionally machine-translated via `tlang`.
async fn fetch_track(
    client: &reqwest::Client,
    track: &TrackInfo,
    translate_to: Option<&str>,
) -> Result<Vec<Segment>> {
    let url = match translate_to {
        Some(target) => format!("{}&tlang={target}", track.base_url),
        None => track.base_url.clone(),
    };

    let resp = client.get(&url).header("User-Agent", USER_AGENT).send().await?;

    if resp.status().as_u16() == 429 {
        bail!("caption endpoint rate-limited (429)");
    }
    let caption_xml = resp.error_for_status()?.text().await?;

    let segments = parse_caption_xml(&caption_xml)?;
    if segments.is_empty() {
        bail!("caption track contained no cues");
    }
    Ok(segments)
}

fn parse_caption_xml(xml: &str) -> Result<Vec<Segment>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_dur: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = None;
                let mut dur = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"start" => {
                            start = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        b"dur" => {
                            dur = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        _ => {}
                    }
                }
                current_start = start;
                current_dur = dur;
            }
            Ok(Event::Empty(_)) => {
                // Self-closing <text .../> with no content — skip
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(start), Some(dur)) = (current_start.take(), current_dur.take()) {
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    let text = html_escape::decode_html_entities(&raw_text).to_string();
                    if !text.is_empty() {
                        segments.push(Segment {
                            text,
                            start,
                            duration: dur,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(segments)
}
