use serde::{Deserialize, Serialize};

/// Текущая версия формата потока правок
pub const STREAM_VERSION: u32 = 1;

/// 2D-точка в плановых координатах (метры)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Единица измерения расстояний
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Meters,
    Feet,
    Chains,
}

impl DistanceUnit {
    /// Сокращённое обозначение
    pub fn abbrev(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Feet => "ft",
            DistanceUnit::Chains => "ch",
        }
    }

    /// Сколько метров в одной единице
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Feet => 0.3048,
            DistanceUnit::Chains => 20.1168,
        }
    }

    pub fn to_meters(&self, value: f64) -> f64 {
        value * self.meters_per_unit()
    }

    pub fn from_meters(&self, meters: f64) -> f64 {
        meters / self.meters_per_unit()
    }

    /// Все доступные единицы
    pub fn all() -> &'static [DistanceUnit] {
        &[DistanceUnit::Meters, DistanceUnit::Feet, DistanceUnit::Chains]
    }
}

/// Сторона смещения относительно направления
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Знак смещения: влево отрицательное, вправо положительное
    pub fn sign(&self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

/// Начальный угол прямого хода
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartAngle {
    /// Угол в радианах, по часовой стрелке
    pub angle: f64,
    /// true = угол поворота от продолжения предыдущего хода,
    /// false = угол от обратного направления
    #[serde(default)]
    pub deflection: bool,
}

/// Ссылка на объект карты: номер создавшей правки и порядковый номер
/// объекта среди созданных ею
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureRef {
    pub edit: u32,
    pub item: u32,
}

impl FeatureRef {
    pub fn new(edit: u32, item: u32) -> Self {
        Self { edit, item }
    }
}

/// Измеренное расстояние
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub value: f64,
    #[serde(default)]
    pub unit: DistanceUnit,
    /// Фиксированное расстояние не участвует в уравнивании
    #[serde(default)]
    pub fixed: bool,
}

/// Длина: измеренная или заданная точкой
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LengthRecord {
    Distance { distance: DistanceRecord },
    OffsetPoint { point: FeatureRef },
}

/// Смещение направления
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OffsetRecord {
    Distance { distance: DistanceRecord, side: Side },
    Point { point: FeatureRef },
}

/// Способ задания направления
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectionKindRecord {
    /// Дирекционный угол (радианы, по часовой от севера)
    Bearing { bearing: f64 },
    /// Угол от задней точки
    Angle { backsight: FeatureRef, angle: f64 },
    /// Угол поворота от продолжения линии задняя точка → начало
    Deflection { backsight: FeatureRef, angle: f64 },
    /// Параллельно линии между двумя точками
    Parallel { start: FeatureRef, end: FeatureRef },
}

/// Направление из точки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionRecord {
    pub from: FeatureRef,
    pub kind: DirectionKindRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<OffsetRecord>,
}

/// Ход пути (прямой или по дуге)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegRecord {
    Straight {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_angle: Option<StartAngle>,
        distances: Vec<DistanceRecord>,
    },
    Circular {
        radius: DistanceRecord,
        clockwise: bool,
        entry_angle: f64,
        exit_angle: f64,
        length: DistanceRecord,
    },
}

/// Значение изменяемого поля правки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldRecord {
    Feature(FeatureRef),
    MaybeFeature(Option<FeatureRef>),
    Position(Position),
    Vector(Position),
    Text(String),
    Flag(bool),
    Length(LengthRecord),
    Direction(DirectionRecord),
    Offset(OffsetRecord),
    Distance(DistanceRecord),
    Distances(Vec<DistanceRecord>),
    Legs(Vec<LegRecord>),
    Ratio(f64),
}

/// Одно изменённое поле исправления
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItemRecord {
    pub field: String,
    pub value: FieldRecord,
}

/// Правка в сериализованном виде
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditRecord {
    NewPoint {
        position: Position,
    },
    NewLine {
        start: FeatureRef,
        end: FeatureRef,
    },
    NewArc {
        centre: FeatureRef,
        start: FeatureRef,
        end: FeatureRef,
        clockwise: bool,
    },
    NewText {
        anchor: FeatureRef,
        offset: Position,
        text: String,
    },
    IntersectDirectionDistance {
        direction: DirectionRecord,
        from: FeatureRef,
        distance: LengthRecord,
        #[serde(default = "default_true")]
        default: bool,
        #[serde(default)]
        add_direction_line: bool,
        #[serde(default)]
        add_distance_line: bool,
    },
    IntersectTwoDistances {
        from1: FeatureRef,
        distance1: LengthRecord,
        from2: FeatureRef,
        distance2: LengthRecord,
        #[serde(default = "default_true")]
        default: bool,
        #[serde(default)]
        add_line1: bool,
        #[serde(default)]
        add_line2: bool,
    },
    IntersectTwoDirections {
        direction1: DirectionRecord,
        direction2: DirectionRecord,
        #[serde(default)]
        add_line1: bool,
        #[serde(default)]
        add_line2: bool,
    },
    IntersectDirectionLine {
        direction: DirectionRecord,
        line: FeatureRef,
        close_to: Position,
        /// Разбить линию в точке пересечения
        #[serde(default)]
        split: bool,
        #[serde(default)]
        add_direction_line: bool,
    },
    IntersectTwoLines {
        line1: FeatureRef,
        line2: FeatureRef,
        close_to: Position,
        #[serde(default)]
        split1: bool,
        #[serde(default)]
        split2: bool,
    },
    Parallel {
        reference: FeatureRef,
        offset: OffsetRecord,
        #[serde(default)]
        terminal1: Option<FeatureRef>,
        #[serde(default)]
        terminal2: Option<FeatureRef>,
    },
    Radial {
        direction: DirectionRecord,
        length: LengthRecord,
        #[serde(default)]
        add_line: bool,
    },
    LineSubdivision {
        line: FeatureRef,
        distances: Vec<DistanceRecord>,
    },
    /// Разбиение линии одной точкой
    SimpleLineSubdivision {
        line: FeatureRef,
        distance: DistanceRecord,
        #[serde(default)]
        from_end: bool,
    },
    /// Продление линии за её конец
    LineExtension {
        line: FeatureRef,
        #[serde(default = "default_true")]
        from_end: bool,
        length: DistanceRecord,
        #[serde(default)]
        add_line: bool,
    },
    /// Точка на линии (доля длины от начала)
    AttachPoint {
        line: FeatureRef,
        ratio: f64,
    },
    ConnectionPath {
        from: FeatureRef,
        to: FeatureRef,
        legs: Vec<LegRecord>,
    },
    Deletion {
        features: Vec<FeatureRef>,
    },
    SetTopology {
        line: FeatureRef,
        topological: bool,
    },
    Update {
        revised: u32,
        changes: Vec<UpdateItemRecord>,
    },
}

impl EditRecord {
    /// Имя типа правки
    pub fn kind_name(&self) -> &'static str {
        match self {
            EditRecord::NewPoint { .. } => "new_point",
            EditRecord::NewLine { .. } => "new_line",
            EditRecord::NewArc { .. } => "new_arc",
            EditRecord::NewText { .. } => "new_text",
            EditRecord::IntersectDirectionDistance { .. } => "intersect_direction_distance",
            EditRecord::IntersectTwoDistances { .. } => "intersect_two_distances",
            EditRecord::IntersectTwoDirections { .. } => "intersect_two_directions",
            EditRecord::IntersectDirectionLine { .. } => "intersect_direction_line",
            EditRecord::IntersectTwoLines { .. } => "intersect_two_lines",
            EditRecord::Parallel { .. } => "parallel",
            EditRecord::Radial { .. } => "radial",
            EditRecord::LineSubdivision { .. } => "line_subdivision",
            EditRecord::SimpleLineSubdivision { .. } => "simple_line_subdivision",
            EditRecord::LineExtension { .. } => "line_extension",
            EditRecord::AttachPoint { .. } => "attach_point",
            EditRecord::ConnectionPath { .. } => "connection_path",
            EditRecord::Deletion { .. } => "deletion",
            EditRecord::SetTopology { .. } => "set_topology",
            EditRecord::Update { .. } => "update",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    STREAM_VERSION
}

/// Запись потока: правка и число созданных ею объектов
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Сколько объектов создала правка (для проверки воспроизведения)
    pub created: u32,
    pub edit: EditRecord,
}

/// Поток правок: всё, что нужно для восстановления карты
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditStream {
    /// Версия формата
    #[serde(default = "default_version")]
    pub version: u32,
    /// Идентификатор сеанса редактирования
    pub session_id: String,
    /// Правки в порядке выполнения
    #[serde(default)]
    pub edits: Vec<StreamEntry>,
}

impl EditStream {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            version: STREAM_VERSION,
            session_id: session_id.into(),
            edits: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Serialize + for<'de> Deserialize<'de> + PartialEq + std::fmt::Debug>(val: &T) {
        let json = serde_json::to_string(val).expect("serialize");
        let back: T = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(*val, back);
    }

    fn metres(value: f64) -> DistanceRecord {
        DistanceRecord { value, unit: DistanceUnit::Meters, fixed: false }
    }

    #[test]
    fn test_distance_unit_conversion() {
        assert_eq!(DistanceUnit::Meters.to_meters(12.5), 12.5);
        assert!((DistanceUnit::Feet.to_meters(100.0) - 30.48).abs() < 1e-9);
        assert!((DistanceUnit::Chains.from_meters(20.1168) - 1.0).abs() < 1e-12);
        assert_eq!(DistanceUnit::all().len(), 3);
    }

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Left.sign(), -1.0);
        assert_eq!(Side::Right.sign(), 1.0);
    }

    #[test]
    fn test_new_point_serde() {
        let e = EditRecord::NewPoint { position: Position::new(10.0, -5.0) };
        roundtrip(&e);
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains(r#""type":"new_point""#));
    }

    #[test]
    fn test_direction_record_serde() {
        let d = DirectionRecord {
            from: FeatureRef::new(0, 0),
            kind: DirectionKindRecord::Angle { backsight: FeatureRef::new(1, 0), angle: 1.2 },
            offset: Some(OffsetRecord::Distance { distance: metres(5.0), side: Side::Left }),
        };
        roundtrip(&d);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains(r#""type":"angle""#));
        assert!(json.contains(r#""side":"left""#));
    }

    #[test]
    fn test_direction_without_offset_omits_field() {
        let d = DirectionRecord {
            from: FeatureRef::new(0, 0),
            kind: DirectionKindRecord::Bearing { bearing: 0.5 },
            offset: None,
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("offset"));
        roundtrip(&d);
    }

    #[test]
    fn test_distance_defaults() {
        let d: DistanceRecord = serde_json::from_str(r#"{"value": 3.0}"#).unwrap();
        assert_eq!(d.unit, DistanceUnit::Meters);
        assert!(!d.fixed);
    }

    #[test]
    fn test_intersection_default_flag_defaults_true() {
        let json = r#"{
            "type": "intersect_two_distances",
            "from1": {"edit": 0, "item": 0},
            "distance1": {"type": "distance", "distance": {"value": 60.0}},
            "from2": {"edit": 1, "item": 0},
            "distance2": {"type": "offset_point", "point": {"edit": 2, "item": 0}}
        }"#;
        let e: EditRecord = serde_json::from_str(json).unwrap();
        match e {
            EditRecord::IntersectTwoDistances { default, add_line1, add_line2, .. } => {
                assert!(default);
                assert!(!add_line1 && !add_line2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_line_extension_defaults_to_end() {
        let json = r#"{
            "type": "line_extension",
            "line": {"edit": 2, "item": 0},
            "length": {"value": 12.5}
        }"#;
        let e: EditRecord = serde_json::from_str(json).unwrap();
        assert_eq!(e.kind_name(), "line_extension");
        match e {
            EditRecord::LineExtension { from_end, add_line, .. } => {
                assert!(from_end);
                assert!(!add_line);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_update_record_serde() {
        let e = EditRecord::Update {
            revised: 3,
            changes: vec![
                UpdateItemRecord {
                    field: "distance".into(),
                    value: FieldRecord::Length(LengthRecord::Distance { distance: metres(101.0) }),
                },
                UpdateItemRecord {
                    field: "terminal1".into(),
                    value: FieldRecord::MaybeFeature(None),
                },
            ],
        };
        roundtrip(&e);
        assert_eq!(e.kind_name(), "update");
    }

    #[test]
    fn test_leg_record_serde() {
        let legs = vec![
            LegRecord::Straight {
                start_angle: Some(StartAngle { angle: 1.5, deflection: true }),
                distances: vec![metres(10.0), metres(12.0)],
            },
            LegRecord::Circular {
                radius: metres(50.0),
                clockwise: true,
                entry_angle: std::f64::consts::FRAC_PI_2,
                exit_angle: std::f64::consts::FRAC_PI_2,
                length: metres(20.0),
            },
        ];
        roundtrip(&legs);
    }

    #[test]
    fn test_edit_stream_json() {
        let mut stream = EditStream::new("session-1");
        stream.edits.push(StreamEntry {
            created: 1,
            edit: EditRecord::NewPoint { position: Position::new(0.0, 0.0) },
        });
        stream.edits.push(StreamEntry {
            created: 0,
            edit: EditRecord::SetTopology { line: FeatureRef::new(0, 0), topological: false },
        });
        let json = stream.to_json().unwrap();
        let back = EditStream::from_json(&json).unwrap();
        assert_eq!(stream, back);
        assert_eq!(back.version, STREAM_VERSION);
    }

    #[test]
    fn test_edit_stream_version_default() {
        let back = EditStream::from_json(r#"{"session_id": "s"}"#).unwrap();
        assert_eq!(back.version, STREAM_VERSION);
        assert!(back.edits.is_empty());
    }
}
