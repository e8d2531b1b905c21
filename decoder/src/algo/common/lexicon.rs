//! Wordlists backing the filename heuristics.

/// Song qualifiers that appear in titles across the supported languages.
pub const SONG_KEYWORDS: &[&str] = &[
    // English
    "Live", "live", "LIVE", "Remix", "remix", "REMIX", "Cover", "cover", "COVER", "Acoustic",
    "acoustic", "ACOUSTIC", "Instrumental", "instrumental", "INSTRUMENTAL", "Demo", "demo",
    "DEMO", "Version", "version", "VERSION", "Mix", "mix", "MIX", "Remaster", "remaster",
    "REMASTER", "Extended", "extended", "EXTENDED", "Radio", "radio", "RADIO", "Edit", "edit",
    "EDIT",
    // Chinese
    "现场", "翻唱", "伴奏", "纯音乐", "演奏版", "重制版", "混音版", "电台版", "完整版",
    "精选版", "特别版", "原声版",
    // Japanese
    "ライブ", "リミックス", "カバー", "アコースティック", "インストゥルメンタル", "デモ",
    "バージョン", "ミックス", "リマスター",
    // Korean
    "라이브", "리믹스", "커버", "어쿠스틱", "인스트루멘탈", "데모", "버전", "믹스",
    "리마스터",
];

/// Release-quality suffixes stripped from filename stems, case variants
/// included.
pub const QUALITY_SUFFIXES: &[&str] = &[
    "_hires", "_HIRES", "_HiRes",
    "_live", "_LIVE", "_Live",
    "_lossless", "_LOSSLESS", "_Lossless",
    "_flac", "_FLAC", "_Flac",
    "_dsd", "_DSD", "_Dsd",
    "_24bit", "_24BIT", "_24Bit",
    "_96khz", "_96KHZ", "_96kHz",
    "_192khz", "_192KHZ", "_192kHz",
    "_studio", "_STUDIO", "_Studio",
    "_master", "_MASTER", "_Master",
    "_remaster", "_REMASTER", "_Remaster",
    "_original", "_ORIGINAL", "_Original",
    "_deluxe", "_DELUXE", "_Deluxe",
    "_special", "_SPECIAL", "_Special",
    "_edition", "_EDITION", "_Edition",
    "_version", "_VERSION", "_Version",
];

pub const CHINESE_SURNAMES: &[&str] = &[
    "王", "李", "张", "刘", "陈", "杨", "黄", "赵", "周", "吴", "徐", "孙", "朱", "马", "胡",
    "郭", "林", "何", "高", "梁", "郑", "罗", "宋", "谢", "唐", "韩", "曹", "许", "邓", "萧",
    "蒋", "沈", "秦", "尤", "吕", "施", "孔", "严", "华", "金", "魏", "陶", "姜",
];

pub const JAPANESE_SURNAME_CHARS: &[&str] = &[
    "田", "中", "佐", "藤", "山", "木", "村", "井", "上", "野", "川", "松", "本", "小", "林",
    "高", "橋", "渡", "辺", "伊", "加", "森", "石", "前", "近", "坂",
];

pub const KOREAN_SURNAMES: &[&str] = &[
    "김", "이", "박", "최", "정", "강", "조", "윤", "장", "임", "한", "오", "서", "신", "권",
    "황", "안", "송", "류", "전", "홍", "고", "문", "양", "손", "배", "백", "허", "유", "노",
    "심", "원", "민", "성", "곽", "변", "남", "진", "어", "엄", "채", "천", "방", "공", "현",
    "함", "염", "여", "추", "도", "소", "석", "선", "설", "마", "길", "주", "연", "위", "표",
    "명", "기", "반", "금", "옥", "육", "인", "맹", "제", "모", "탁", "국", "은", "편", "구",
    "용", "갈", "등", "좌", "승", "사",
    // stage name, treated like a surname
    "싸",
];

/// Thematic words that score a side as a song title, with weights.
pub const CHINESE_TITLE_PATTERNS: &[(&str, f64)] = &[
    // places
    ("北京", 3.0), ("上海", 3.0), ("广州", 3.0), ("深圳", 3.0), ("杭州", 3.0), ("南京", 3.0),
    ("西安", 3.0), ("成都", 3.0), ("重庆", 3.0), ("天津", 3.0), ("香港", 3.0), ("台北", 3.0),
    ("澳门", 3.0),
    // emotions
    ("爱情", 4.0), ("思念", 4.0), ("回忆", 4.0), ("梦想", 4.0), ("青春", 4.0), ("孤独", 4.0),
    ("寂寞", 4.0), ("温柔", 4.0), ("浪漫", 4.0), ("甜蜜", 4.0), ("心痛", 4.0), ("眼泪", 4.0),
    ("微笑", 4.0), ("拥抱", 4.0), ("告别", 4.0),
    // time
    ("昨天", 3.0), ("今天", 3.0), ("明天", 3.0), ("永远", 3.0), ("瞬间", 3.0), ("春天", 3.0),
    ("夏天", 3.0), ("秋天", 3.0), ("冬天", 3.0), ("夜晚", 3.0), ("黎明", 3.0), ("黄昏", 3.0),
    ("午夜", 3.0),
    // colors
    ("红色", 3.0), ("蓝色", 3.0), ("白色", 3.0), ("黑色", 3.0), ("绿色", 3.0), ("紫色", 3.0),
    ("黄色", 3.0), ("粉色", 3.0), ("灰色", 3.0),
    // nature
    ("月亮", 3.0), ("太阳", 3.0), ("星星", 3.0), ("海洋", 3.0), ("山峰", 3.0), ("花朵", 3.0),
    ("树叶", 3.0), ("雨水", 3.0), ("雪花", 3.0), ("风景", 3.0),
    // abstractions
    ("自由", 3.0), ("希望", 3.0), ("信念", 3.0), ("勇气", 3.0), ("力量", 3.0), ("奇迹", 3.0),
    ("命运", 3.0), ("缘分", 3.0), ("幸福", 3.0), ("快乐", 3.0),
];

pub const ENGLISH_TITLE_PATTERNS: &[(&str, f64)] = &[
    ("love", 4.0), ("heart", 4.0), ("dream", 4.0), ("hope", 4.0), ("life", 4.0), ("time", 4.0),
    ("night", 4.0), ("day", 4.0), ("light", 4.0), ("dark", 4.0), ("soul", 4.0), ("mind", 4.0),
    ("eyes", 4.0), ("smile", 4.0), ("tears", 4.0), ("kiss", 4.0), ("touch", 4.0), ("hold", 4.0),
    ("feel", 4.0), ("miss", 4.0),
    ("dance", 3.0), ("sing", 3.0), ("fly", 3.0), ("run", 3.0), ("walk", 3.0), ("fall", 3.0),
    ("rise", 3.0), ("shine", 3.0), ("burn", 3.0), ("break", 3.0),
    ("moon", 3.0), ("sun", 3.0), ("star", 3.0), ("sky", 3.0), ("sea", 3.0), ("fire", 3.0),
    ("water", 3.0), ("wind", 3.0), ("rain", 3.0), ("snow", 3.0),
    ("freedom", 3.0), ("peace", 3.0), ("power", 3.0), ("magic", 3.0), ("wonder", 3.0),
    ("miracle", 3.0), ("destiny", 3.0), ("forever", 3.0), ("always", 3.0), ("never", 3.0),
];

pub const JAPANESE_TITLE_PATTERNS: &[(&str, f64)] = &[
    ("愛", 4.0), ("恋", 4.0), ("心", 4.0), ("夢", 4.0), ("希望", 4.0), ("涙", 4.0),
    ("笑顔", 4.0), ("想い", 4.0), ("気持ち", 4.0), ("感情", 4.0),
    ("今日", 3.0), ("明日", 3.0), ("昨日", 3.0), ("永遠", 3.0), ("瞬間", 3.0), ("春", 3.0),
    ("夏", 3.0), ("秋", 3.0), ("冬", 3.0), ("夜", 3.0),
    ("月", 3.0), ("太陽", 3.0), ("星", 3.0), ("海", 3.0), ("空", 3.0), ("花", 3.0),
    ("桜", 3.0), ("雨", 3.0), ("雪", 3.0), ("風", 3.0),
    ("自由", 3.0), ("平和", 3.0), ("力", 3.0), ("魔法", 3.0), ("奇跡", 3.0),
];

pub const KOREAN_TITLE_PATTERNS: &[(&str, f64)] = &[
    ("사랑", 4.0), ("마음", 4.0), ("꿈", 4.0), ("희망", 4.0), ("기억", 4.0), ("눈물", 4.0),
    ("미소", 4.0), ("그리움", 4.0), ("행복", 4.0), ("슬픔", 4.0),
    ("오늘", 3.0), ("내일", 3.0), ("어제", 3.0), ("영원", 3.0), ("순간", 3.0), ("봄", 3.0),
    ("여름", 3.0), ("가을", 3.0), ("겨울", 3.0), ("밤", 3.0),
    ("달", 3.0), ("해", 3.0), ("별", 3.0), ("바다", 3.0), ("하늘", 3.0), ("꽃", 3.0),
    ("나무", 3.0), ("비", 3.0), ("눈", 3.0), ("바람", 3.0),
    ("자유", 3.0), ("평화", 3.0), ("힘", 3.0), ("기적", 3.0), ("운명", 3.0),
];

/// Group/ensemble markers that score a side as an artist.
pub const CHINESE_ARTIST_PATTERNS: &[(&str, f64)] = &[
    ("组合", 3.0), ("乐队", 3.0), ("乐团", 3.0), ("合唱团", 3.0), ("工作室", 3.0),
    ("音乐", 2.0), ("歌手", 2.0), ("艺人", 2.0), ("明星", 2.0),
    ("小", 2.0), ("大", 2.0), ("老", 2.0), ("阿", 2.0),
];

pub const ENGLISH_ARTIST_PATTERNS: &[(&str, f64)] = &[
    ("band", 3.0), ("group", 3.0), ("crew", 3.0), ("collective", 3.0), ("orchestra", 3.0),
    ("ensemble", 3.0), ("choir", 3.0), ("quartet", 3.0), ("trio", 3.0), ("duo", 3.0),
    ("brothers", 3.0), ("sisters", 3.0),
    ("mc", 2.0), ("dj", 2.0), ("dr", 2.0), ("mr", 2.0), ("ms", 2.0),
    ("the", 1.0), ("and", 1.0), ("of", 1.0), ("for", 1.0),
];

pub const JAPANESE_ARTIST_PATTERNS: &[(&str, f64)] = &[
    ("バンド", 3.0), ("グループ", 3.0), ("ユニット", 3.0), ("チーム", 3.0), ("楽団", 3.0),
    ("合唱団", 3.0), ("オーケストラ", 3.0),
    ("さん", 2.0), ("ちゃん", 2.0), ("くん", 2.0), ("様", 2.0),
];

pub const KOREAN_ARTIST_PATTERNS: &[(&str, f64)] = &[
    ("밴드", 3.0), ("그룹", 3.0), ("팀", 3.0), ("유닛", 3.0), ("오케스트라", 3.0),
    ("합창단", 3.0), ("앙상블", 3.0),
    ("씨", 2.0), ("님", 2.0), ("군", 2.0), ("양", 2.0),
];

/// Second words that mark an English two-word phrase as a probable song
/// name rather than a person.
pub const ENGLISH_SONG_WORDS: &[&str] = &[
    "Story", "Song", "Dream", "Night", "Day", "Love", "Heart", "Life", "Time", "World",
];
